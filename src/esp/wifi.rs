// esp/wifi.rs

use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use crate::*;

/// Station-mode radio on top of the ESP-IDF driver. `join` only issues the
/// connect request; the connector polls `is_connected` for readiness.
pub struct EspRadio {
    wifi: BlockingWifi<EspWifi<'static>>,
}

impl EspRadio {
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self { wifi }
    }
}

impl WifiRadio for EspRadio {
    fn power_on(&mut self) -> AppResult<()> {
        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration::default()))?;
        self.wifi.start()?;
        info!("WiFi radio started");
        Ok(())
    }

    fn scan(&mut self) -> AppResult<Vec<String>> {
        let aps = self.wifi.scan()?;
        for ap in &aps {
            debug!("  {:?} ch {} rssi {}", ap.ssid.as_str(), ap.channel, ap.signal_strength);
        }
        Ok(aps.iter().map(|ap| ap.ssid.to_string()).collect())
    }

    fn join(&mut self, candidate: &NetworkCandidate) -> AppResult<()> {
        let auth_method = if candidate.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client = ClientConfiguration {
            ssid: candidate
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| AppError::Radio(format!("SSID too long: {:?}", candidate.ssid)))?,
            password: candidate
                .password
                .as_str()
                .try_into()
                .map_err(|_| AppError::Radio("WiFi password too long".into()))?,
            auth_method,
            ..Default::default()
        };
        self.wifi.set_configuration(&Configuration::Client(client))?;
        self.wifi.wifi_mut().connect()?;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    fn ip_address(&mut self) -> Option<net::Ipv4Addr> {
        match self.wifi.wifi().sta_netif().get_ip_info() {
            Ok(info) => Some(info.ip),
            Err(e) => {
                warn!("WiFi: no IP info: {e:?}");
                None
            }
        }
    }

    fn disconnect(&mut self) -> AppResult<()> {
        self.wifi.wifi_mut().disconnect()?;
        Ok(())
    }

    fn power_off(&mut self) -> AppResult<()> {
        self.wifi.stop()?;
        info!("WiFi radio stopped");
        Ok(())
    }
}

// EOF
