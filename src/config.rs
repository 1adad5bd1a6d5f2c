// config.rs

use crc::{Crc, CRC_32_ISCSI};

use crate::*;

pub const CONFIG_BUF_SIZE: usize = 1024;

const CONFIG_NAME: &str = "cfg";

/// First byte of every ESP-IDF application image.
pub const ESP_IMAGE_MAGIC: u8 = 0xE9;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCandidate {
    pub ssid: String,
    pub password: String,
}

impl NetworkCandidate {
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MyConfig {
    /// Known networks in priority order.
    pub networks: Vec<NetworkCandidate>,

    pub remote_url: String,
    pub update_url: String,

    pub default_sleep_secs: u32,
    pub wifi_max_attempts: u32,
    pub wifi_poll_ms: u32,
    pub fetch_retries: u32,
    pub fetch_retry_ms: u32,

    /// Battery readings below this are reported as a disconnected battery.
    pub min_battery_volts: f32,
    pub shunt_milliohms: u32,

    /// An update image must start with one of these byte strings.
    pub image_prefixes: Vec<Vec<u8>>,
}

impl Default for MyConfig {
    fn default() -> Self {
        let mut networks = vec![NetworkCandidate::new(
            option_env!("WIFI_SSID").unwrap_or("internet"),
            option_env!("WIFI_PASS").unwrap_or(""),
        )];
        if let Some(ssid) = option_env!("WIFI_SSID2") {
            networks.push(NetworkCandidate::new(ssid, option_env!("WIFI_PASS2").unwrap_or("")));
        }

        Self {
            networks,

            remote_url: option_env!("REMOTE_URL")
                .unwrap_or("https://script.google.com/macros/s/boatmon/exec")
                .into(),
            update_url: option_env!("UPDATE_URL")
                .unwrap_or("http://firmware.local/esp32boatmon.bin")
                .into(),

            default_sleep_secs: 300,
            wifi_max_attempts: 25,
            wifi_poll_ms: 1000,
            fetch_retries: 3,
            fetch_retry_ms: 1000,

            min_battery_volts: 10.0,
            shunt_milliohms: 100,

            image_prefixes: vec![vec![ESP_IMAGE_MAGIC]],
        }
    }
}

impl MyConfig {
    pub fn poll_step(&self) -> Duration {
        Duration::from_millis(self.wifi_poll_ms as u64)
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_retry_ms as u64)
    }

    pub fn default_sleep(&self) -> Duration {
        Duration::from_secs(self.default_sleep_secs as u64)
    }

    pub fn shunt_ohms(&self) -> f32 {
        self.shunt_milliohms as f32 / 1000.0
    }

    pub fn from_storage(storage: &mut dyn Storage) -> Option<Self> {
        info!("Reading config from storage...");
        let b = match storage.read(CONFIG_NAME) {
            Err(e) => {
                error!("Config read error {e}");
                return None;
            }
            Ok(Some(b)) => b,
            Ok(None) => {
                error!("Config key not found");
                return None;
            }
        };
        info!("Got {sz} bytes from storage. Parsing config...", sz = b.len());

        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let digest = crc.digest();
        match postcard::from_bytes_crc32::<MyConfig>(&b, digest) {
            Ok(c) => {
                info!("Successfully parsed config from storage.");
                Some(c)
            }
            Err(e) => {
                error!("Cannot parse config from storage: {e:?}");
                None
            }
        }
    }

    pub fn to_storage(&self, storage: &mut dyn Storage) -> AppResult<()> {
        let mut buf = [0u8; CONFIG_BUF_SIZE];
        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let digest = crc.digest();
        let data = postcard::to_slice_crc32(self, &mut buf, digest)
            .map_err(|e| AppError::Message(format!("Cannot encode config to buffer {e:?}")))?;
        info!("Encoded config to {sz} bytes. Saving...", sz = data.len());

        storage.write(CONFIG_NAME, data)?;
        storage.sync()?;
        info!("Config saved.");
        Ok(())
    }

    /// Stored config, or the build-time defaults written back to storage.
    pub fn load_or_default(storage: &mut dyn Storage) -> Self {
        match Self::from_storage(storage) {
            Some(c) => c,
            None => {
                error!("Could not read stored config, using defaults");
                let c = MyConfig::default();
                match c.to_storage(storage) {
                    Ok(()) => info!("Successfully saved default config."),
                    Err(e) => error!("Cannot save default config: {e}"),
                }
                c
            }
        }
    }
}


// EOF
