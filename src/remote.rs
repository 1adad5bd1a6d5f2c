// remote.rs — key/value config read and telemetry write over HTTP GET

use serde_json::{Map, Value};
use url::Url;

use crate::*;

pub const UPLOAD_OK: &str = "OK";

const MAX_TEXT_BODY: usize = 8192;

const KEY_SLEEP: &str = "Sleep-seconds";
const KEY_VERSION: &str = "Version";
const KEY_CHECKSUM: &str = "Checksum";

/// Receives one response. `status` comes first, before any body bytes; an
/// error from either method stops the transfer.
pub trait ResponseSink {
    fn status(&mut self, status: u16) -> AppResult<()>;
    fn chunk(&mut self, chunk: &[u8]) -> AppResult<()>;
}

pub trait HttpClient {
    /// GET `url` into `response`. Returns the HTTP status once the body has
    /// been consumed.
    fn get(&mut self, url: &str, response: &mut dyn ResponseSink) -> AppResult<u16>;
}

#[derive(Default)]
struct TextBody {
    body: Vec<u8>,
}

impl ResponseSink for TextBody {
    fn status(&mut self, _status: u16) -> AppResult<()> {
        Ok(())
    }

    fn chunk(&mut self, chunk: &[u8]) -> AppResult<()> {
        if self.body.len() + chunk.len() > MAX_TEXT_BODY {
            return Err(AppError::Http(format!("response larger than {MAX_TEXT_BODY} bytes")));
        }
        self.body.extend_from_slice(chunk);
        Ok(())
    }
}

/// GET a small text body.
pub fn get_text(http: &mut dyn HttpClient, url: &str) -> AppResult<(u16, String)> {
    let mut text = TextBody::default();
    let status = http.get(url, &mut text)?;
    Ok((status, String::from_utf8_lossy(&text.body).into_owned()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub sleep_seconds: Option<u32>,
    pub published_version: String,
    /// Lowercase hex SHA-256 of the published image.
    pub image_sha256: Option<String>,
}

impl RemoteConfig {
    pub fn from_json(body: &str) -> AppResult<Self> {
        let map: Map<String, Value> = serde_json::from_str(body)?;

        let sleep_seconds = match map.get(KEY_SLEEP) {
            None | Some(Value::Null) => None,
            Some(v) => {
                let secs = json_u32(v).filter(|s| *s > 0);
                if secs.is_none() {
                    warn!("Ignoring unusable {KEY_SLEEP} value {v}");
                }
                secs
            }
        };

        let published_version = match map.get(KEY_VERSION) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0.0".to_string(),
        };

        let image_sha256 = match map.get(KEY_CHECKSUM) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_ascii_lowercase()),
            _ => None,
        };

        Ok(Self {
            sleep_seconds,
            published_version,
            image_sha256,
        })
    }
}

fn json_u32(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => match n.as_u64() {
            Some(u) => u32::try_from(u).ok(),
            // spreadsheets like to hand out 600.0
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u32),
        },
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ordered field name → value list, one per cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryRecord {
    fields: Vec<(&'static str, String)>,
}

impl TelemetryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &'static str, value: impl ToString) -> &mut Self {
        self.fields.push((name, value.to_string()));
        self
    }

    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }
}

pub struct RemoteConfigClient<'a> {
    base_url: &'a str,
    retries: u32,
    retry_delay: Duration,
}

impl<'a> RemoteConfigClient<'a> {
    pub fn new(config: &'a MyConfig) -> Self {
        Self {
            base_url: &config.remote_url,
            retries: config.fetch_retries.max(1),
            retry_delay: config.fetch_retry_delay(),
        }
    }

    pub fn read_url(&self) -> AppResult<Url> {
        Ok(Url::parse_with_params(self.base_url, &[("action", "read")])?)
    }

    pub fn write_url(&self, record: &TelemetryRecord) -> AppResult<Url> {
        let mut url = Url::parse(self.base_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", "write");
            for (k, v) in record.fields() {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// `None` once every attempt has failed.
    pub fn fetch(&self, http: &mut dyn HttpClient, clock: &dyn Clock) -> Option<RemoteConfig> {
        for attempt in 1..=self.retries {
            match self.try_fetch(http) {
                Ok(c) => {
                    info!("Remote config: {c:?}");
                    return Some(c);
                }
                Err(e) => {
                    warn!("Remote config attempt {attempt}/{} failed: {e}", self.retries);
                    if attempt < self.retries {
                        clock.sleep(self.retry_delay);
                    }
                }
            }
        }
        error!("Failed to fetch remote config after {} attempts", self.retries);
        None
    }

    fn try_fetch(&self, http: &mut dyn HttpClient) -> AppResult<RemoteConfig> {
        let url = self.read_url()?;
        let (status, body) = get_text(http, url.as_str())?;
        if !(200..300).contains(&status) {
            return Err(AppError::Http(format!("status {status}")));
        }
        RemoteConfig::from_json(&body)
    }

    /// Raw response body, or an `Error: ...` text. Never fails.
    pub fn upload(&self, http: &mut dyn HttpClient, record: &TelemetryRecord) -> String {
        let result = self
            .write_url(record)
            .and_then(|url| {
                info!("Uploading telemetry: {}", url.query().unwrap_or_default());
                get_text(http, url.as_str())
            });
        match result {
            Ok((status, body)) => {
                if !(200..300).contains(&status) {
                    warn!("Telemetry upload returned status {status}");
                }
                body
            }
            Err(e) => format!("Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeClock, ScriptedHttp};

    fn client_config() -> MyConfig {
        MyConfig {
            remote_url: "https://example.com/macros/exec".into(),
            ..MyConfig::default()
        }
    }

    #[test]
    fn parses_the_recognized_keys() {
        let c = RemoteConfig::from_json(r#"{"Sleep-seconds": 600, "Version": "1.4", "Other": true}"#).unwrap();
        assert_eq!(c.sleep_seconds, Some(600));
        assert_eq!(c.published_version, "1.4");
        assert_eq!(c.image_sha256, None);
    }

    #[test]
    fn tolerates_spreadsheet_typing() {
        let c = RemoteConfig::from_json(r#"{"Sleep-seconds": "900", "Version": 1.4, "Checksum": " ABCD "}"#).unwrap();
        assert_eq!(c.sleep_seconds, Some(900));
        assert_eq!(c.published_version, "1.4");
        assert_eq!(c.image_sha256.as_deref(), Some("abcd"));

        let c = RemoteConfig::from_json(r#"{"Sleep-seconds": 120.0}"#).unwrap();
        assert_eq!(c.sleep_seconds, Some(120));
        assert_eq!(c.published_version, "0.0");
    }

    #[test]
    fn unusable_sleep_values_are_dropped() {
        for body in [
            r#"{"Sleep-seconds": -5}"#,
            r#"{"Sleep-seconds": 0}"#,
            r#"{"Sleep-seconds": "soon"}"#,
            r#"{"Sleep-seconds": 1.5}"#,
            r#"{"Sleep-seconds": null}"#,
        ] {
            assert_eq!(RemoteConfig::from_json(body).unwrap().sleep_seconds, None, "{body}");
        }
    }

    #[test]
    fn non_object_body_is_an_error() {
        assert!(RemoteConfig::from_json("<html>moved</html>").is_err());
        assert!(RemoteConfig::from_json("[1,2]").is_err());
    }

    #[test]
    fn fetch_retries_then_succeeds() {
        let config = client_config();
        let mut http = ScriptedHttp::default();
        http.push_read(Err("timeout"));
        http.push_read(Ok((200, r#"{"Version": "2.0"}"#)));
        let clock = FakeClock::new();

        let c = RemoteConfigClient::new(&config).fetch(&mut http, &clock).unwrap();
        assert_eq!(c.published_version, "2.0");
        assert_eq!(http.requests.len(), 2);
        assert_eq!(http.requests[0], "https://example.com/macros/exec?action=read");
        assert_eq!(clock.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn fetch_gives_up_after_retry_budget() {
        let config = client_config();
        let mut http = ScriptedHttp::default();
        http.push_read(Ok((500, "oops")));
        http.push_read(Ok((200, "not json")));
        http.push_read(Err("dns"));
        http.push_read(Ok((200, r#"{"Version": "9.9"}"#)));
        let clock = FakeClock::new();

        assert_eq!(RemoteConfigClient::new(&config).fetch(&mut http, &clock), None);
        assert_eq!(http.requests.len(), 3);
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn upload_escapes_query_structure_characters() {
        let config = client_config();
        let mut record = TelemetryRecord::new();
        record.push("SSID", "Dock A&B=1").push("IP_address", "10.0.0.7").push("Note", "a/b: c");

        let url = RemoteConfigClient::new(&config).write_url(&record).unwrap();
        assert_eq!(
            url.query(),
            Some("action=write&SSID=Dock+A%26B%3D1&IP_address=10.0.0.7&Note=a%2Fb%3A+c")
        );
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[1], ("SSID".to_string(), "Dock A&B=1".to_string()));
    }

    #[test]
    fn upload_returns_body_or_error_text() {
        let config = client_config();
        let client = RemoteConfigClient::new(&config);
        let mut record = TelemetryRecord::new();
        record.push("Temp", "70.1");

        let mut http = ScriptedHttp::default();
        http.push_write(Ok((200, "OK")));
        http.push_write(Err("connection reset"));
        assert_eq!(client.upload(&mut http, &record), UPLOAD_OK);
        let failed = client.upload(&mut http, &record);
        assert!(failed.starts_with("Error: "), "{failed}");
        assert!(http.requests[0].contains("action=write&Temp=70.1"));
    }

    #[test]
    fn oversized_text_body_is_rejected() {
        let mut http = ScriptedHttp::default();
        let big = "x".repeat(MAX_TEXT_BODY + 1);
        http.push_read(Ok((200, big.as_str())));
        assert!(get_text(&mut http, "https://example.com/exec?action=read").is_err());
    }
}

// EOF
