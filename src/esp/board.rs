// esp/board.rs

use embedded_svc::io::Write;
use esp_idf_hal::{
    gpio::{AnyOutputPin, Output, PinDriver},
    temp_sensor::{TempSensorConfig, TempSensorDriver},
};
use esp_idf_svc::ota::{EspOta, EspOtaUpdate};

use crate::*;

pub struct EspLeds {
    power: PinDriver<'static, AnyOutputPin, Output>,
    wifi: PinDriver<'static, AnyOutputPin, Output>,
    upload: PinDriver<'static, AnyOutputPin, Output>,
}

impl EspLeds {
    pub fn new(power: AnyOutputPin, wifi: AnyOutputPin, upload: AnyOutputPin) -> AppResult<Self> {
        Ok(Self {
            power: PinDriver::output(power)?,
            wifi: PinDriver::output(wifi)?,
            upload: PinDriver::output(upload)?,
        })
    }
}

impl StatusIndicator for EspLeds {
    fn set(&mut self, led: Led, on: bool) {
        let pin = match led {
            Led::Power => &mut self.power,
            Led::Wifi => &mut self.wifi,
            Led::Upload => &mut self.upload,
        };
        let res = if on { pin.set_high() } else { pin.set_low() };
        if let Err(e) = res {
            debug!("LED {led:?}: {e:?}");
        }
    }
}

/// On-die temperature sensor.
pub struct EspTemperature {
    driver: TempSensorDriver<'static>,
}

impl EspTemperature {
    pub fn new(driver: TempSensorDriver<'static>) -> Self {
        Self { driver }
    }

    pub fn config() -> TempSensorConfig {
        TempSensorConfig::default()
    }
}

impl TemperatureSensor for EspTemperature {
    fn init(&mut self) -> AppResult<()> {
        self.driver.enable()?;
        Ok(())
    }

    fn read_fahrenheit(&mut self) -> AppResult<f32> {
        let celsius = self.driver.get_celsius()?;
        Ok(celsius * 9.0 / 5.0 + 32.0)
    }
}

/// Writes the new image into the inactive OTA slot. One update per boot.
pub struct OtaSink<'a> {
    ota: Option<&'a mut EspOta>,
    update: Option<EspOtaUpdate<'a>>,
    written: usize,
}

impl<'a> OtaSink<'a> {
    pub fn new(ota: &'a mut EspOta) -> Self {
        Self {
            ota: Some(ota),
            update: None,
            written: 0,
        }
    }

    fn update(&mut self) -> AppResult<&mut EspOtaUpdate<'a>> {
        self.update
            .as_mut()
            .ok_or_else(|| AppError::Firmware("no update in progress".into()))
    }
}

impl FirmwareSink for OtaSink<'_> {
    fn begin(&mut self) -> AppResult<()> {
        let ota = self
            .ota
            .take()
            .ok_or_else(|| AppError::Firmware("OTA already used this boot".into()))?;
        self.update = Some(ota.initiate_update()?);
        self.written = 0;
        info!("OTA update started");
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.update()?
            .write_all(chunk)
            .map_err(|e| AppError::Firmware(format!("OTA write failed: {e:?}")))?;
        self.written += chunk.len();
        Ok(())
    }

    fn finish(&mut self) -> AppResult<()> {
        let update = self
            .update
            .take()
            .ok_or_else(|| AppError::Firmware("no update in progress".into()))?;
        update.complete()?;
        info!("OTA update complete, {} bytes, new image set as boot slot", self.written);
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(update) = self.update.take() {
            match update.abort() {
                Ok(()) => info!("OTA update aborted after {} bytes", self.written),
                Err(e) => error!("OTA abort failed: {e:?}"),
            }
        }
    }
}

/// Running image has completed a cycle; stop the bootloader from rolling back.
pub fn mark_running_slot_valid() {
    match EspOta::new().and_then(|mut ota| ota.mark_running_slot_valid()) {
        Ok(()) => debug!("Running OTA slot marked valid"),
        Err(e) => warn!("Cannot mark running slot valid: {e:?}"),
    }
}

pub fn deep_sleep(duration: Duration) -> ! {
    info!("Deep sleep for {}s", duration.as_secs());
    unsafe { esp_idf_sys::esp_deep_sleep(duration.as_micros() as u64) }
}

pub fn restart() -> ! {
    info!("Restarting");
    esp_idf_hal::reset::restart()
}

// EOF
