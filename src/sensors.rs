// sensors.rs

use crate::*;

/// Voltage/current/power sensor on one measurement point.
pub trait PowerMonitor {
    fn init(&mut self) -> AppResult<()> {
        Ok(())
    }
    fn read_voltage(&mut self) -> AppResult<f32>;
    fn read_current(&mut self) -> AppResult<f32>;
    fn read_power(&mut self) -> AppResult<f32>;
}

pub trait TemperatureSensor {
    fn init(&mut self) -> AppResult<()> {
        Ok(())
    }
    fn read_fahrenheit(&mut self) -> AppResult<f32>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorReading {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
}

impl SensorReading {
    /// `None` when the monitor is absent or any register read faults.
    pub fn read(monitor: Option<&mut dyn PowerMonitor>) -> Option<Self> {
        match Self::try_read(monitor?) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("Sensor read failed: {e}");
                None
            }
        }
    }

    fn try_read(m: &mut dyn PowerMonitor) -> AppResult<Self> {
        Ok(Self {
            voltage: m.read_voltage()?,
            current: m.read_current()?,
            power: m.read_power()?,
        })
    }
}

/// What one battery branch reports upstream.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BranchReport {
    /// 0 when the battery is missing or reads implausibly low.
    pub battery_volts: f32,
    pub solar_amps: f32,
}

impl BranchReport {
    pub fn from_reading(reading: Option<SensorReading>, min_volts: f32) -> Self {
        match reading {
            None => Self::default(),
            Some(r) => Self {
                battery_volts: if r.voltage < min_volts { 0.0 } else { r.voltage },
                solar_amps: r.current,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BatteryReport {
    pub house: BranchReport,
    pub engine: BranchReport,
}

/// The node's sensors. Every slot is optional; a slot whose device fails to
/// initialize is emptied and stays unavailable for the rest of the cycle.
#[derive(Default)]
pub struct SensorSuite<'a> {
    /// Measures the node's own consumption.
    pub supply: Option<&'a mut dyn PowerMonitor>,
    pub house: Option<&'a mut dyn PowerMonitor>,
    pub engine: Option<&'a mut dyn PowerMonitor>,
    pub temperature: Option<&'a mut dyn TemperatureSensor>,
}

impl<'a> SensorSuite<'a> {
    pub fn init(&mut self) {
        init_monitor("supply", &mut self.supply);
        init_monitor("house", &mut self.house);
        init_monitor("engine", &mut self.engine);

        let failed = match self.temperature.as_deref_mut() {
            Some(t) => t.init().err(),
            None => None,
        };
        if let Some(e) = failed {
            warn!("Temperature sensor init failed, unavailable this cycle: {e}");
            self.temperature = None;
        }
    }

    pub fn supply(&mut self) -> Option<&mut dyn PowerMonitor> {
        reborrow(&mut self.supply)
    }

    pub fn read_batteries(&mut self, min_volts: f32) -> BatteryReport {
        let report = BatteryReport {
            house: BranchReport::from_reading(SensorReading::read(reborrow(&mut self.house)), min_volts),
            engine: BranchReport::from_reading(SensorReading::read(reborrow(&mut self.engine)), min_volts),
        };
        info!(
            "Batteries: house {:.2}V solar {:.2}A, engine {:.2}V solar {:.2}A",
            report.house.battery_volts,
            report.house.solar_amps,
            report.engine.battery_volts,
            report.engine.solar_amps
        );
        report
    }

    pub fn read_temperature_f(&mut self) -> Option<f32> {
        match self.temperature.as_deref_mut()?.read_fahrenheit() {
            Ok(t) => {
                info!("Temperature {t:.1}F");
                Some(t)
            }
            Err(e) => {
                warn!("Temperature read failed: {e}");
                None
            }
        }
    }
}

fn reborrow<'s>(slot: &'s mut Option<&mut dyn PowerMonitor>) -> Option<&'s mut dyn PowerMonitor> {
    match slot {
        Some(m) => Some(&mut **m),
        None => None,
    }
}

fn init_monitor(name: &str, slot: &mut Option<&mut dyn PowerMonitor>) {
    let failed = match slot.as_deref_mut() {
        Some(m) => m.init().err(),
        None => {
            info!("No {name} monitor fitted");
            None
        }
    };
    if let Some(e) = failed {
        warn!("{name} monitor init failed, unavailable this cycle: {e}");
        *slot = None;
    }
}


// EOF
