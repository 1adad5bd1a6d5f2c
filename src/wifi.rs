// wifi.rs

use crate::*;

/// Station-mode radio as the connector sees it.
pub trait WifiRadio {
    fn power_on(&mut self) -> AppResult<()>;
    /// SSIDs currently on the air.
    fn scan(&mut self) -> AppResult<Vec<String>>;
    /// Issues the join request; readiness is polled separately.
    fn join(&mut self, candidate: &NetworkCandidate) -> AppResult<()>;
    /// Associated and holding an address.
    fn is_connected(&mut self) -> bool;
    fn ip_address(&mut self) -> Option<net::Ipv4Addr>;
    fn disconnect(&mut self) -> AppResult<()>;
    fn power_off(&mut self) -> AppResult<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectState {
    Idle,
    Scanning,
    /// Index into the candidate list.
    Connecting(usize),
    Connected,
    ExhaustedCandidates,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub ssid: String,
    pub ip: Option<net::Ipv4Addr>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionOutcome {
    pub connection: Option<Connection>,
    /// Poll steps spent on the last candidate tried.
    pub attempts: u32,
}

impl ConnectionOutcome {
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn ssid(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.ssid.as_str())
    }
}

pub struct NetworkConnector<'a> {
    candidates: &'a [NetworkCandidate],
    max_attempts: u32,
    poll_step: Duration,
    state: ConnectState,
}

impl<'a> NetworkConnector<'a> {
    pub fn new(config: &'a MyConfig) -> Self {
        Self {
            candidates: &config.networks,
            max_attempts: config.wifi_max_attempts,
            poll_step: config.poll_step(),
            state: ConnectState::Idle,
        }
    }

    pub fn state(&self) -> &ConnectState {
        &self.state
    }

    fn transition(&mut self, next: ConnectState) {
        debug!("WiFi: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Tries each visible candidate in priority order until one comes up.
    /// Failures end up in the returned outcome, never as an error.
    pub fn connect(
        &mut self,
        radio: &mut dyn WifiRadio,
        clock: &dyn Clock,
        leds: &mut dyn StatusIndicator,
    ) -> ConnectionOutcome {
        if let Err(e) = radio.power_on() {
            error!("WiFi: radio power on failed: {e}");
            return self.exhausted(radio, leds, 0);
        }

        self.transition(ConnectState::Scanning);
        let visible = match radio.scan() {
            Ok(ssids) => {
                info!("WiFi: {} networks visible", ssids.len());
                Some(ssids)
            }
            Err(e) => {
                // without a scan result every candidate gets a try
                warn!("WiFi: scan failed: {e}");
                None
            }
        };

        let candidates = self.candidates;
        let mut attempts = 0;
        for (i, candidate) in candidates.iter().enumerate() {
            if let Some(ssids) = &visible {
                if !ssids.iter().any(|s| *s == candidate.ssid) {
                    debug!("WiFi: {:?} not visible", candidate.ssid);
                    continue;
                }
            }

            self.transition(ConnectState::Connecting(i));
            info!("WiFi: connecting to {:?}", candidate.ssid);
            attempts = 0;
            if let Err(e) = radio.join(candidate) {
                warn!("WiFi: join request for {:?} failed: {e}", candidate.ssid);
                continue;
            }

            while !radio.is_connected() && attempts < self.max_attempts {
                blink(leds, clock, self.poll_step);
                attempts += 1;
            }

            if radio.is_connected() {
                self.transition(ConnectState::Connected);
                leds.set(Led::Wifi, true);
                let ip = radio.ip_address();
                info!(
                    "WiFi: connected to {:?} in {attempts} attempts, IP {ip:?}",
                    candidate.ssid
                );
                return ConnectionOutcome {
                    connection: Some(Connection {
                        ssid: candidate.ssid.clone(),
                        ip,
                    }),
                    attempts,
                };
            }

            warn!("WiFi: {:?} not ready after {attempts} attempts", candidate.ssid);
            leds.set(Led::Wifi, false);
            if let Err(e) = radio.disconnect() {
                debug!("WiFi: disconnect after failed join: {e}");
            }
        }

        self.exhausted(radio, leds, attempts)
    }

    fn exhausted(&mut self, radio: &mut dyn WifiRadio, leds: &mut dyn StatusIndicator, attempts: u32) -> ConnectionOutcome {
        self.transition(ConnectState::ExhaustedCandidates);
        warn!("WiFi: no known network reachable, radio off");
        leds.set(Led::Wifi, false);
        if let Err(e) = radio.power_off() {
            error!("WiFi: radio power off failed: {e}");
        }
        ConnectionOutcome {
            connection: None,
            attempts,
        }
    }

    /// Releases the link and powers the radio down, whatever the cycle did.
    pub fn disconnect(&mut self, radio: &mut dyn WifiRadio, leds: &mut dyn StatusIndicator, outcome: &ConnectionOutcome) {
        if outcome.is_connected() {
            if let Err(e) = radio.disconnect() {
                warn!("WiFi: disconnect failed: {e}");
            }
            if let Err(e) = radio.power_off() {
                error!("WiFi: radio power off failed: {e}");
            }
            info!("WiFi disconnected and radio off");
        }
        leds.set(Led::Wifi, false);
        self.transition(ConnectState::Idle);
    }
}

fn blink(leds: &mut dyn StatusIndicator, clock: &dyn Clock, step: Duration) {
    let off = step * 3 / 10;
    leds.set(Led::Wifi, false);
    clock.sleep(off);
    leds.set(Led::Wifi, true);
    clock.sleep(step - off);
}


// EOF
