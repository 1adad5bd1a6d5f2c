// ina219.rs — INA219 bus voltage / shunt current monitor over I2C

use embedded_hal::i2c::I2c;

use crate::*;

// https://www.ti.com/lit/ds/symlink/ina219.pdf

pub const DEFAULT_ADDRESS: u8 = 0x40;

const REG_CONFIG: u8 = 0x00;
const REG_SHUNT_VOLTAGE: u8 = 0x01;
const REG_BUS_VOLTAGE: u8 = 0x02;

// 32V bus range, /8 PGA (±320mV), 12-bit ADCs, shunt and bus continuous
const CONFIG_32V_320MV: u16 = 0x399F;

const BUS_LSB_V: f32 = 0.004;
const SHUNT_LSB_MV: f32 = 0.01;
const BUS_OVERFLOW: u16 = 0x0001;

pub struct Ina219<I> {
    i2c: I,
    address: u8,
    shunt_ohms: f32,
}

impl<I: I2c> Ina219<I> {
    pub fn new(i2c: I, address: u8, shunt_ohms: f32) -> Self {
        Self {
            i2c,
            address,
            shunt_ohms,
        }
    }

    fn write_register(&mut self, reg: u8, value: u16) -> AppResult<()> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(|e| AppError::Sensor(format!("INA219@{:#04x} write {reg:#04x}: {e:?}", self.address)))
    }

    fn read_register(&mut self, reg: u8) -> AppResult<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| AppError::Sensor(format!("INA219@{:#04x} read {reg:#04x}: {e:?}", self.address)))?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn shunt_voltage_mv(&mut self) -> AppResult<f32> {
        let raw = self.read_register(REG_SHUNT_VOLTAGE)? as i16;
        Ok(raw as f32 * SHUNT_LSB_MV)
    }

    pub fn bus_voltage(&mut self) -> AppResult<f32> {
        let raw = self.read_register(REG_BUS_VOLTAGE)?;
        if raw & BUS_OVERFLOW != 0 {
            return Err(AppError::Sensor(format!(
                "INA219@{:#04x}: math overflow",
                self.address
            )));
        }
        Ok((raw >> 3) as f32 * BUS_LSB_V)
    }
}

impl<I: I2c> PowerMonitor for Ina219<I> {
    fn init(&mut self) -> AppResult<()> {
        self.write_register(REG_CONFIG, CONFIG_32V_320MV)?;
        let readback = self.read_register(REG_CONFIG)?;
        if readback != CONFIG_32V_320MV {
            return Err(AppError::Sensor(format!(
                "INA219@{:#04x}: config readback {readback:#06x}",
                self.address
            )));
        }
        info!("INA219@{:#04x} configured", self.address);
        Ok(())
    }

    fn read_voltage(&mut self) -> AppResult<f32> {
        self.bus_voltage()
    }

    fn read_current(&mut self) -> AppResult<f32> {
        Ok(self.shunt_voltage_mv()? / 1000.0 / self.shunt_ohms)
    }

    fn read_power(&mut self) -> AppResult<f32> {
        Ok(self.bus_voltage()? * self.read_current()?)
    }
}


// EOF
