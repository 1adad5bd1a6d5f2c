// lib.rs

pub use std::{
    net,
    time::{Duration, Instant},
};

pub use log::*;
pub use serde::{Deserialize, Serialize};

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
pub use error::*;

mod clock;
pub use clock::*;

mod config;
pub use config::*;

mod storage;
pub use storage::*;

mod state;
pub use state::*;

mod energy;
pub use energy::*;

mod sensors;
pub use sensors::*;

pub mod ina219;
pub use ina219::Ina219;

mod indicator;
pub use indicator::*;

mod wifi;
pub use wifi::*;

mod remote;
pub use remote::*;

mod update;
pub use update::*;

mod cycle;
pub use cycle::*;

#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(test)]
mod testutil;

// EOF
