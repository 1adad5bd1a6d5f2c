// state.rs

use crate::*;

pub const FAIL_KEY: &str = "fail";
pub const ENERGY_KEY: &str = "energy";
pub const VERSION_KEY: &str = "version";
pub const SLEEP_KEY: &str = "sleep";

/// Everything that has to outlive a deep sleep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersistentState {
    /// Consecutive cycles that could not join any network.
    pub fail_count: u32,
    pub cumulative_energy_mah: f64,
    pub installed_version: Version,
    /// Last sleep interval handed out by the remote config.
    pub sleep_seconds: Option<u32>,
}

/// Field-per-key view of [`PersistentState`] on top of a [`Storage`].
///
/// Loading never fails: a missing or unparsable field falls back to its
/// default without touching the other fields. Saving is best-effort and only
/// rewrites fields that differ from what is known to be on storage.
pub struct PersistentStore<'a> {
    storage: &'a mut dyn Storage,
    stored: PersistentState,
}

impl<'a> PersistentStore<'a> {
    pub fn new(storage: &'a mut dyn Storage) -> Self {
        Self {
            storage,
            stored: PersistentState::default(),
        }
    }

    pub fn load(&mut self) -> PersistentState {
        let state = PersistentState {
            fail_count: self
                .read_field(FAIL_KEY, |s| s.parse::<u32>().ok())
                .unwrap_or(0),
            cumulative_energy_mah: self
                .read_field(ENERGY_KEY, |s| {
                    s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
                })
                .unwrap_or(0.0),
            installed_version: self
                .read_field(VERSION_KEY, |s| Some(parse_version(s)))
                .unwrap_or_default(),
            sleep_seconds: self.read_field(SLEEP_KEY, |s| s.parse::<u32>().ok().filter(|v| *v > 0)),
        };
        info!(
            "Loaded state: fail_count={} energy={:.3}mAh version={} sleep={:?}",
            state.fail_count, state.cumulative_energy_mah, state.installed_version, state.sleep_seconds
        );
        self.stored = state.clone();
        state
    }

    /// Returns `true` when every changed field reached storage.
    pub fn save(&mut self, state: &PersistentState) -> bool {
        let mut ok = true;

        if state.fail_count != self.stored.fail_count {
            if self.write_field(FAIL_KEY, &state.fail_count.to_string()) {
                self.stored.fail_count = state.fail_count;
            } else {
                ok = false;
            }
        }

        if state.cumulative_energy_mah != self.stored.cumulative_energy_mah {
            if self.write_field(ENERGY_KEY, &state.cumulative_energy_mah.to_string()) {
                self.stored.cumulative_energy_mah = state.cumulative_energy_mah;
            } else {
                ok = false;
            }
        }

        if state.installed_version != self.stored.installed_version {
            if self.write_field(VERSION_KEY, &state.installed_version.to_string()) {
                self.stored.installed_version = state.installed_version;
            } else {
                ok = false;
            }
        }

        if let Some(secs) = state.sleep_seconds {
            if state.sleep_seconds != self.stored.sleep_seconds {
                if self.write_field(SLEEP_KEY, &secs.to_string()) {
                    self.stored.sleep_seconds = Some(secs);
                } else {
                    ok = false;
                }
            }
        }

        // must be on flash before the power goes away
        if let Err(e) = self.storage.sync() {
            error!("Storage sync failed: {e}");
            ok = false;
        }
        ok
    }

    /// The values currently believed to be on storage.
    pub fn stored(&self) -> &PersistentState {
        &self.stored
    }

    fn read_field<T>(&mut self, key: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        match self.storage.read(key) {
            Ok(Some(raw)) => match std::str::from_utf8(&raw).ok().map(str::trim).and_then(parse) {
                Some(v) => Some(v),
                None => {
                    warn!("Stored {key:?} is corrupt, using default");
                    None
                }
            },
            Ok(None) => {
                info!("No stored {key:?}, using default");
                None
            }
            Err(e) => {
                error!("Reading {key:?} failed: {e}");
                None
            }
        }
    }

    fn write_field(&mut self, key: &str, value: &str) -> bool {
        match self.storage.write(key, value.as_bytes()) {
            Ok(()) => {
                info!("Saved {key}={value}");
                true
            }
            Err(e) => {
                error!("Failed to write {key}: {e}");
                false
            }
        }
    }
}


// EOF
