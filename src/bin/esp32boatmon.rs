// bin/esp32boatmon.rs

#[cfg(target_os = "espidf")]
mod device {
    use std::cell::RefCell;

    use embedded_hal_bus::i2c::RefCellDevice;
    use esp_idf_hal::{
        i2c::{I2cConfig, I2cDriver},
        prelude::*,
        temp_sensor::TempSensorDriver,
    };
    use esp_idf_svc::{
        eventloop::EspSystemEventLoop,
        nvs,
        ota::EspOta,
        wifi::{BlockingWifi, EspWifi},
    };

    use esp32boatmon::{esp::*, *};

    const SUPPLY_MONITOR: u8 = ina219::DEFAULT_ADDRESS;
    const HOUSE_MONITOR: u8 = 0x41;
    const ENGINE_MONITOR: u8 = 0x44;

    pub fn main() -> ! {
        esp_idf_sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        info!("esp32boatmon {FW_VERSION} awake.");

        match run() {
            Ok(CycleEnd::Restart) => restart(),
            Ok(CycleEnd::Sleep(duration)) => {
                mark_running_slot_valid();
                deep_sleep(duration)
            }
            Err(e) => {
                // the battery matters more than this cycle
                error!("Cycle setup failed: {e:#}");
                deep_sleep(MyConfig::default().default_sleep())
            }
        }
    }

    fn run() -> anyhow::Result<CycleEnd> {
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;

        let ns = env!("CARGO_BIN_NAME");
        let nvs = nvs::EspNvs::new(nvs_default_partition.clone(), ns, true)?;
        info!("Got namespace {ns:?} from default partition");
        let mut storage = NvsStorage::new(nvs);

        let config = MyConfig::load_or_default(&mut storage);
        debug!("My config:\n{config:#?}");

        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        // green, blue, red
        let mut leds: Box<dyn StatusIndicator> = match EspLeds::new(
            pins.gpio3.downgrade_output(),
            pins.gpio4.downgrade_output(),
            pins.gpio5.downgrade_output(),
        ) {
            Ok(leds) => Box::new(leds),
            Err(e) => {
                warn!("Status LEDs unavailable: {e}");
                Box::new(NoIndicator)
            }
        };

        // I2C pins: GPIO6=SDA, GPIO7=SCL
        let i2c_config = I2cConfig::new().baudrate(100.kHz().into());
        let bus = match I2cDriver::new(peripherals.i2c0, pins.gpio6, pins.gpio7, &i2c_config) {
            Ok(driver) => Some(RefCell::new(driver)),
            Err(e) => {
                error!("I2C bus unavailable, no power monitors this cycle: {e:?}");
                None
            }
        };
        let shunt_ohms = config.shunt_ohms();
        let mut monitors = bus.as_ref().map(|bus| {
            [SUPPLY_MONITOR, HOUSE_MONITOR, ENGINE_MONITOR]
                .map(|address| Ina219::new(RefCellDevice::new(bus), address, shunt_ohms))
        });

        let mut temperature =
            match TempSensorDriver::new(&EspTemperature::config(), peripherals.temp_sensor) {
                Ok(driver) => Some(EspTemperature::new(driver)),
                Err(e) => {
                    warn!("Temperature sensor unavailable: {e:?}");
                    None
                }
            };

        let mut sensors = SensorSuite::default();
        if let Some([supply, house, engine]) = monitors.as_mut() {
            sensors.supply = Some(supply);
            sensors.house = Some(house);
            sensors.engine = Some(engine);
        }
        if let Some(t) = temperature.as_mut() {
            sensors.temperature = Some(t);
        }

        let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_default_partition))?;
        let mut radio = EspRadio::new(BlockingWifi::wrap(wifi, sysloop)?);
        let mut http = EspHttp::new();
        let mut ota = EspOta::new()?;
        let mut firmware = OtaSink::new(&mut ota);
        let clock = SystemClock;

        let board = Board {
            radio: &mut radio,
            http: &mut http,
            firmware: &mut firmware,
            leds: leds.as_mut(),
            sensors,
            clock: &clock,
        };
        let mut controller = DutyCycleController::new(&config, PersistentStore::new(&mut storage), board);
        Ok(controller.run_cycle())
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    device::main()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("esp32boatmon only runs on ESP-IDF targets");
}

// EOF
