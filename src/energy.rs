// energy.rs

use crate::*;

const SECS_PER_HOUR: f64 = 3600.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergySample {
    pub at: Instant,
    pub current_ma: f64,
}

/// Integrates irregular current samples into mAh for one wake cycle.
///
/// Each sample is held for the time since the previous one (the first sample
/// measures from the cycle start), so accuracy depends on the caller sampling
/// at both ends of every phase it wants counted.
#[derive(Clone, Debug)]
pub struct EnergyAccumulator {
    cycle_energy_mah: f64,
    last_sample: Instant,
    samples: u32,
}

impl EnergyAccumulator {
    pub fn new(cycle_start: Instant) -> Self {
        Self {
            cycle_energy_mah: 0.0,
            last_sample: cycle_start,
            samples: 0,
        }
    }

    pub fn reset(&mut self, cycle_start: Instant) {
        *self = Self::new(cycle_start);
    }

    /// Adds one sample and returns its contribution in mAh.
    pub fn record(&mut self, sample: EnergySample) -> f64 {
        let elapsed = sample.at.saturating_duration_since(self.last_sample);
        let hours = elapsed.as_secs_f64() / SECS_PER_HOUR;
        // negative readings are sensor noise, not charging
        let current_ma = if sample.current_ma.is_finite() && sample.current_ma > 0.0 {
            sample.current_ma
        } else {
            0.0
        };
        let added = current_ma * hours;

        self.cycle_energy_mah += added;
        self.last_sample = self.last_sample.max(sample.at);
        self.samples += 1;
        added
    }

    /// Reads the supply monitor and records the result. An absent or faulting
    /// monitor contributes nothing for the elapsed interval.
    pub fn sample(&mut self, monitor: Option<&mut dyn PowerMonitor>, clock: &dyn Clock) -> f64 {
        let current_ma = match monitor.map(|m| m.read_current()) {
            Some(Ok(amps)) => amps as f64 * 1000.0,
            Some(Err(e)) => {
                debug!("Supply current unavailable: {e}");
                0.0
            }
            None => 0.0,
        };
        self.record(EnergySample {
            at: clock.now(),
            current_ma,
        })
    }

    pub fn cycle_energy_mah(&self) -> f64 {
        self.cycle_energy_mah
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}


// EOF
