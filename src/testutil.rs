// testutil.rs — in-memory stand-ins for the board

use std::{
    cell::Cell,
    collections::{HashMap, HashSet, VecDeque},
};

use crate::*;

/// Clock that only moves when told to. `sleep` advances it too.
pub struct FakeClock {
    origin: Instant,
    offset: Cell<Duration>,
    slept: Cell<Duration>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            slept: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, d: Duration) {
        self.offset.set(self.offset.get() + d);
    }

    /// Total time spent in `sleep`.
    pub fn elapsed(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept.set(self.slept.get() + duration);
    }
}

#[derive(Default)]
pub struct MemStorage {
    data: HashMap<String, Vec<u8>>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    writes: Vec<String>,
    syncs: u32,
}

impl MemStorage {
    /// Puts a raw value in place without going through `write`.
    pub fn insert(&mut self, key: &str, value: &[u8]) {
        self.data.insert(key.into(), value.to_vec());
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Vec<u8>> {
        self.data.get_mut(key)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn fail_reads(&mut self, key: &str) {
        self.failing_reads.insert(key.into());
    }

    pub fn fail_writes(&mut self, key: &str) {
        self.failing_writes.insert(key.into());
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.syncs = 0;
    }

    /// Keys successfully written, in order.
    pub fn writes(&self) -> &[String] {
        &self.writes
    }

    pub fn syncs(&self) -> u32 {
        self.syncs
    }
}

impl Storage for MemStorage {
    fn read(&mut self, key: &str) -> AppResult<Option<Vec<u8>>> {
        if self.failing_reads.contains(key) {
            return Err(AppError::Storage(format!("read {key}: injected fault")));
        }
        Ok(self.data.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &[u8]) -> AppResult<()> {
        if self.failing_writes.contains(key) {
            return Err(AppError::Storage(format!("write {key}: injected fault")));
        }
        self.data.insert(key.into(), value.to_vec());
        self.writes.push(key.into());
        Ok(())
    }

    fn sync(&mut self) -> AppResult<()> {
        self.syncs += 1;
        Ok(())
    }
}

/// Radio with a fixed set of visible networks. A joined network becomes
/// ready after its configured number of failed polls; others never do.
pub struct ScriptedRadio {
    visible: Vec<String>,
    ready: HashMap<String, u32>,
    joined: Option<String>,
    polls_left: Option<u32>,
    pub joins: Vec<String>,
    pub passwords: Vec<String>,
    pub disconnects: u32,
    pub powered: bool,
    pub scan_fails: bool,
    pub power_on_fails: bool,
}

impl ScriptedRadio {
    pub fn new(visible: &[&str]) -> Self {
        Self {
            visible: visible.iter().map(|s| s.to_string()).collect(),
            ready: HashMap::new(),
            joined: None,
            polls_left: None,
            joins: Vec::new(),
            passwords: Vec::new(),
            disconnects: 0,
            powered: false,
            scan_fails: false,
            power_on_fails: false,
        }
    }

    pub fn ready_after(mut self, ssid: &str, polls: u32) -> Self {
        self.ready.insert(ssid.into(), polls);
        self
    }
}

impl WifiRadio for ScriptedRadio {
    fn power_on(&mut self) -> AppResult<()> {
        if self.power_on_fails {
            return Err(AppError::Radio("injected power on fault".into()));
        }
        self.powered = true;
        Ok(())
    }

    fn scan(&mut self) -> AppResult<Vec<String>> {
        if self.scan_fails {
            return Err(AppError::Radio("injected scan fault".into()));
        }
        Ok(self.visible.clone())
    }

    fn join(&mut self, candidate: &NetworkCandidate) -> AppResult<()> {
        self.joins.push(candidate.ssid.clone());
        self.passwords.push(candidate.password.clone());
        self.joined = Some(candidate.ssid.clone());
        self.polls_left = self.ready.get(&candidate.ssid).copied();
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        match self.polls_left.as_mut() {
            Some(0) => self.joined.is_some(),
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        }
    }

    fn ip_address(&mut self) -> Option<net::Ipv4Addr> {
        self.joined.as_ref().map(|_| net::Ipv4Addr::new(10, 0, 0, 7))
    }

    fn disconnect(&mut self) -> AppResult<()> {
        self.disconnects += 1;
        self.joined = None;
        self.polls_left = None;
        Ok(())
    }

    fn power_off(&mut self) -> AppResult<()> {
        self.powered = false;
        self.joined = None;
        self.polls_left = None;
        Ok(())
    }
}

enum Reply {
    Body(u16, Vec<u8>),
    /// Delivers the bytes, then fails.
    Broken(Vec<u8>, String),
}

impl Reply {
    fn scripted(reply: Result<(u16, &str), &str>) -> Self {
        match reply {
            Ok((status, body)) => Self::Body(status, body.as_bytes().to_vec()),
            Err(e) => Self::Broken(Vec::new(), e.into()),
        }
    }
}

/// Serves queued replies by request kind and records every URL requested.
/// Bodies arrive in small chunks.
#[derive(Default)]
pub struct ScriptedHttp {
    reads: VecDeque<Reply>,
    writes: VecDeque<Reply>,
    images: VecDeque<Reply>,
    pub requests: Vec<String>,
}

impl ScriptedHttp {
    const CHUNK: usize = 7;

    pub fn push_read(&mut self, reply: Result<(u16, &str), &str>) {
        self.reads.push_back(Reply::scripted(reply));
    }

    pub fn push_write(&mut self, reply: Result<(u16, &str), &str>) {
        self.writes.push_back(Reply::scripted(reply));
    }

    pub fn push_image(&mut self, status: u16, body: &[u8]) {
        self.images.push_back(Reply::Body(status, body.to_vec()));
    }

    pub fn push_image_broken(&mut self, partial: &[u8], error: &str) {
        self.images.push_back(Reply::Broken(partial.to_vec(), error.into()));
    }
}

impl HttpClient for ScriptedHttp {
    fn get(&mut self, url: &str, sink: &mut dyn ResponseSink) -> AppResult<u16> {
        self.requests.push(url.into());
        let queue = if url.contains("action=read") {
            &mut self.reads
        } else if url.contains("action=write") {
            &mut self.writes
        } else {
            &mut self.images
        };

        match queue.pop_front() {
            None => Err(AppError::Http(format!("no scripted reply for {url}"))),
            Some(Reply::Body(status, body)) => {
                sink.status(status)?;
                for chunk in body.chunks(Self::CHUNK) {
                    sink.chunk(chunk)?;
                }
                Ok(status)
            }
            Some(Reply::Broken(body, error)) => {
                sink.status(200)?;
                for chunk in body.chunks(Self::CHUNK) {
                    sink.chunk(chunk)?;
                }
                Err(AppError::Http(error))
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingLeds {
    lit: HashSet<&'static str>,
    ever: HashSet<&'static str>,
}

fn led_name(led: Led) -> &'static str {
    match led {
        Led::Power => "power",
        Led::Wifi => "wifi",
        Led::Upload => "upload",
    }
}

impl RecordingLeds {
    pub fn is_on(&self, led: Led) -> bool {
        self.lit.contains(led_name(led))
    }

    pub fn ever_on(&self, led: Led) -> bool {
        self.ever.contains(led_name(led))
    }
}

impl StatusIndicator for RecordingLeds {
    fn set(&mut self, led: Led, on: bool) {
        if on {
            self.lit.insert(led_name(led));
            self.ever.insert(led_name(led));
        } else {
            self.lit.remove(led_name(led));
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub began: bool,
    pub finished: bool,
    pub aborted: bool,
    pub data: Vec<u8>,
}

impl FirmwareSink for RecordingSink {
    fn begin(&mut self) -> AppResult<()> {
        self.began = true;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    fn finish(&mut self) -> AppResult<()> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

pub struct FakeMonitor {
    volts: f32,
    amps: f32,
    faulty: bool,
    init_fails: bool,
}

impl FakeMonitor {
    pub fn new(volts: f32, amps: f32) -> Self {
        Self {
            volts,
            amps,
            faulty: false,
            init_fails: false,
        }
    }

    /// Every read fails.
    pub fn faulty() -> Self {
        Self {
            faulty: true,
            ..Self::new(0.0, 0.0)
        }
    }

    pub fn with_init_failure(mut self) -> Self {
        self.init_fails = true;
        self
    }

    fn value(&self, v: f32) -> AppResult<f32> {
        if self.faulty {
            return Err(AppError::Sensor("injected read fault".into()));
        }
        Ok(v)
    }
}

impl PowerMonitor for FakeMonitor {
    fn init(&mut self) -> AppResult<()> {
        if self.init_fails {
            return Err(AppError::Sensor("no ack".into()));
        }
        Ok(())
    }

    fn read_voltage(&mut self) -> AppResult<f32> {
        self.value(self.volts)
    }

    fn read_current(&mut self) -> AppResult<f32> {
        self.value(self.amps)
    }

    fn read_power(&mut self) -> AppResult<f32> {
        self.value(self.volts * self.amps)
    }
}

pub struct FakeTemperature {
    fahrenheit: f32,
    init_fails: bool,
}

impl FakeTemperature {
    pub fn new(fahrenheit: f32) -> Self {
        Self {
            fahrenheit,
            init_fails: false,
        }
    }

    pub fn with_init_failure(mut self) -> Self {
        self.init_fails = true;
        self
    }
}

impl TemperatureSensor for FakeTemperature {
    fn init(&mut self) -> AppResult<()> {
        if self.init_fails {
            return Err(AppError::Sensor("temperature sensor not ready".into()));
        }
        Ok(())
    }

    fn read_fahrenheit(&mut self) -> AppResult<f32> {
        Ok(self.fahrenheit)
    }
}

// EOF
