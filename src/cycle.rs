// cycle.rs — one wake cycle, from state load to the power-down request

use crate::*;

const UPLOAD_OK_SHOW: Duration = Duration::from_secs(1);
const SETTLE_BEFORE_SLEEP: Duration = Duration::from_millis(200);
const SETTLE_BEFORE_RESTART: Duration = Duration::from_secs(2);

/// How a cycle ends. The caller turns this into a deep sleep or a reset;
/// either way the next cycle starts from a fresh boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleEnd {
    Sleep(Duration),
    Restart,
}

/// Hardware the controller drives during a cycle.
pub struct Board<'a> {
    pub radio: &'a mut dyn WifiRadio,
    pub http: &'a mut dyn HttpClient,
    pub firmware: &'a mut dyn FirmwareSink,
    pub leds: &'a mut dyn StatusIndicator,
    pub sensors: SensorSuite<'a>,
    pub clock: &'a dyn Clock,
}

pub struct DutyCycleController<'a> {
    config: &'a MyConfig,
    store: PersistentStore<'a>,
    board: Board<'a>,
    state: PersistentState,
    energy: EnergyAccumulator,
    sleep: Duration,
}

impl<'a> DutyCycleController<'a> {
    pub fn new(config: &'a MyConfig, store: PersistentStore<'a>, board: Board<'a>) -> Self {
        let start = board.clock.now();
        Self {
            config,
            store,
            board,
            state: PersistentState::default(),
            energy: EnergyAccumulator::new(start),
            sleep: config.default_sleep(),
        }
    }

    /// State as of the last step of the cycle.
    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    pub fn cycle_energy_mah(&self) -> f64 {
        self.energy.cycle_energy_mah()
    }

    /// Runs one full cycle. Never fails: every fault degrades to a default
    /// and the cycle always ends with a sleep or a restart request.
    pub fn run_cycle(&mut self) -> CycleEnd {
        let config = self.config;
        let clock = self.board.clock;

        self.energy.reset(clock.now());
        self.state = self.store.load();
        self.sleep = self
            .state
            .sleep_seconds
            .map(|s| Duration::from_secs(s as u64))
            .unwrap_or_else(|| config.default_sleep());
        info!(
            "Cycle start: firmware {FW_VERSION}, installed {}, fail_count {}, sleep {}s",
            self.state.installed_version,
            self.state.fail_count,
            self.sleep.as_secs()
        );
        self.board.leds.running();

        self.board.sensors.init();
        self.checkpoint("start");

        let mut connector = NetworkConnector::new(config);
        let outcome = connector.connect(self.board.radio, clock, self.board.leds);
        self.checkpoint("connect");

        if !outcome.is_connected() {
            self.state.fail_count = self.state.fail_count.saturating_add(1);
            warn!(
                "WiFi failed {} times in a row, skipping upload",
                self.state.fail_count
            );
            self.store.save(&self.state);
            return self.finish(&mut connector, &outcome, CycleEnd::Sleep(self.sleep));
        }

        let client = RemoteConfigClient::new(config);
        let remote = client.fetch(self.board.http, clock);
        self.checkpoint("remote config");

        match &remote {
            Some(remote) => {
                if let Some(secs) = remote.sleep_seconds {
                    info!("Sleep interval from remote config: {secs}s");
                    self.sleep = Duration::from_secs(secs as u64);
                    self.state.sleep_seconds = Some(secs);
                }

                let manager = UpdateManager::new(config);
                match manager.check_and_apply(
                    remote,
                    self.state.installed_version,
                    self.board.http,
                    self.board.firmware,
                ) {
                    UpdateOutcome::Installed(version) => {
                        self.state.installed_version = version;
                        if !self.store.save(&self.state) {
                            error!("New version {version} installed but not fully recorded");
                        }
                        info!("Restarting to apply update {version}");
                        return self.finish(&mut connector, &outcome, CycleEnd::Restart);
                    }
                    UpdateOutcome::Rejected(reason) => {
                        warn!("Update skipped this cycle: {reason}");
                    }
                    UpdateOutcome::UpToDate => {}
                }
            }
            None => warn!("Skipping update check because fetch failed"),
        }

        self.checkpoint("sensors");
        let batteries = self.board.sensors.read_batteries(config.min_battery_volts);
        let temperature = self.board.sensors.read_temperature_f();
        self.checkpoint("upload");

        let total_mah = self.state.cumulative_energy_mah + self.energy.cycle_energy_mah();
        let record = self.telemetry(&outcome, &batteries, temperature, total_mah);

        let response = client.upload(self.board.http, &record);
        info!("Telemetry response: {response:?}");
        if response == UPLOAD_OK {
            self.board.leds.set(Led::Upload, true);
            self.state.fail_count = 0;
            self.state.cumulative_energy_mah = total_mah;
            self.store.save(&self.state);
            clock.sleep(UPLOAD_OK_SHOW);
        } else {
            // this cycle's energy is not carried over
            warn!("Upload not accepted, state left as it was");
        }

        self.finish(&mut connector, &outcome, CycleEnd::Sleep(self.sleep))
    }

    fn checkpoint(&mut self, name: &str) {
        let added = self.energy.sample(self.board.sensors.supply(), self.board.clock);
        debug!(
            "Energy at {name}: +{added:.4}mAh, cycle {:.4}mAh",
            self.energy.cycle_energy_mah()
        );
    }

    fn telemetry(
        &self,
        outcome: &ConnectionOutcome,
        batteries: &BatteryReport,
        temperature: Option<f32>,
        total_mah: f64,
    ) -> TelemetryRecord {
        let ip = outcome
            .connection
            .as_ref()
            .and_then(|c| c.ip)
            .map(|ip| ip.to_string())
            .unwrap_or_default();

        let mut record = TelemetryRecord::new();
        record
            .push("Rounds_to_Connect", self.state.fail_count)
            .push("Wifi_Attempts_This_Round", outcome.attempts)
            .push("IP_address", ip)
            .push("SSID", outcome.ssid().unwrap_or_default())
            .push("Temp", temperature.map(|t| format!("{t:.1}")).unwrap_or_default())
            .push("House_Battery", format!("{:.2}", batteries.house.battery_volts))
            .push("Engine_Battery", format!("{:.2}", batteries.engine.battery_volts))
            .push("Engine_Solar", format!("{:.2}", batteries.engine.solar_amps))
            .push("House_Solar", format!("{:.2}", batteries.house.solar_amps))
            .push("Local_Version", self.state.installed_version)
            .push("Power_Used", format!("{total_mah:.3}"));
        record
    }

    fn finish(
        &mut self,
        connector: &mut NetworkConnector<'_>,
        outcome: &ConnectionOutcome,
        end: CycleEnd,
    ) -> CycleEnd {
        self.board.leds.all_off();
        connector.disconnect(self.board.radio, self.board.leds, outcome);
        self.board.clock.sleep(match end {
            CycleEnd::Sleep(_) => SETTLE_BEFORE_SLEEP,
            CycleEnd::Restart => SETTLE_BEFORE_RESTART,
        });
        info!(
            "Cycle done after {:.4}mAh: {end:?}",
            self.energy.cycle_energy_mah()
        );
        end
    }
}


// EOF
