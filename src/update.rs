// update.rs — version check and streamed self-update

use std::fmt;

use sha2::{Digest, Sha256};

use crate::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// `"1.4"` → 1.4, `"2"` → 2.0. Anything unparsable is 0.0.
pub fn parse_version(text: &str) -> Version {
    let mut parts = text.trim().split('.');
    let major = parts.next().and_then(|p| p.trim().parse().ok());
    let minor = match parts.next() {
        None => Some(0),
        Some(p) => p.trim().parse().ok(),
    };
    match (major, minor) {
        (Some(major), Some(minor)) => Version { major, minor },
        _ => {
            debug!("Unparsable version {text:?}");
            Version::default()
        }
    }
}

/// Destination for a new program image. On the device this is the inactive
/// OTA slot; the running image is never written.
pub trait FirmwareSink {
    fn begin(&mut self) -> AppResult<()>;
    fn write(&mut self, chunk: &[u8]) -> AppResult<()>;
    /// Commits the image and makes it the next boot target.
    fn finish(&mut self) -> AppResult<()>;
    /// Drops a partially written image.
    fn abort(&mut self);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    /// Download or validation failed; nothing was installed.
    Rejected(String),
    /// Image committed. The caller persists the version and restarts.
    Installed(Version),
}

pub struct UpdateManager<'a> {
    image_url: &'a str,
    prefixes: &'a [Vec<u8>],
}

impl<'a> UpdateManager<'a> {
    pub fn new(config: &'a MyConfig) -> Self {
        Self {
            image_url: &config.update_url,
            prefixes: &config.image_prefixes,
        }
    }

    pub fn check_and_apply(
        &self,
        remote: &RemoteConfig,
        installed: Version,
        http: &mut dyn HttpClient,
        sink: &mut dyn FirmwareSink,
    ) -> UpdateOutcome {
        let published = parse_version(&remote.published_version);
        if published <= installed {
            info!("Firmware up to date: installed {installed}, published {published}");
            return UpdateOutcome::UpToDate;
        }

        info!("New version available: {installed} -> {published}, fetching {}", self.image_url);
        let mut stream = ImageStream::new(self.prefixes, sink);
        let result = http
            .get(self.image_url, &mut stream)
            .and_then(|_| stream.finish(remote.image_sha256.as_deref()));

        match result {
            Ok(digest) => {
                info!("Installed firmware {published}: {} bytes, sha256 {digest}", stream.len);
                UpdateOutcome::Installed(published)
            }
            Err(e) => {
                stream.abort();
                error!("Firmware update to {published} failed: {e}");
                UpdateOutcome::Rejected(e.to_string())
            }
        }
    }
}

// leading blank lines ahead of a text prefix
const MAX_LEADING_WHITESPACE: usize = 256;

fn is_text_prefix(prefix: &[u8]) -> bool {
    !prefix.is_empty() && prefix.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
}

fn leading_whitespace(data: &[u8]) -> usize {
    data.iter().take_while(|b| b.is_ascii_whitespace()).count()
}

/// Binary prefixes must sit at offset 0; text prefixes may follow whitespace.
fn prefix_matches(prefix: &[u8], head: &[u8]) -> bool {
    head.starts_with(prefix) || (is_text_prefix(prefix) && head[leading_whitespace(head)..].starts_with(prefix))
}

/// Hashes the incoming image and holds it back from the sink until the
/// head has been checked against the accepted prefixes.
struct ImageStream<'s> {
    prefixes: &'s [Vec<u8>],
    sink: &'s mut dyn FirmwareSink,
    head: Vec<u8>,
    hasher: Sha256,
    len: usize,
    started: bool,
}

impl<'s> ImageStream<'s> {
    fn new(prefixes: &'s [Vec<u8>], sink: &'s mut dyn FirmwareSink) -> Self {
        Self {
            prefixes,
            sink,
            head: Vec::new(),
            hasher: Sha256::new(),
            len: 0,
            started: false,
        }
    }

    fn head_ready(&self) -> bool {
        let longest = self.prefixes.iter().map(Vec::len).max().unwrap_or(0);
        let skip = if self.prefixes.iter().any(|p| is_text_prefix(p)) {
            leading_whitespace(&self.head).min(MAX_LEADING_WHITESPACE)
        } else {
            0
        };
        self.head.len() >= longest + skip
    }

    fn start(&mut self) -> AppResult<()> {
        let accepted = self.prefixes.is_empty() || self.prefixes.iter().any(|p| prefix_matches(p, &self.head));
        if !accepted {
            let shown = &self.head[..self.head.len().min(8)];
            return Err(AppError::Firmware(format!(
                "image does not start with a recognized prefix: {shown:02x?}"
            )));
        }

        self.sink.begin()?;
        self.started = true;
        let head = std::mem::take(&mut self.head);
        self.sink.write(&head)
    }

    fn finish(&mut self, expected_sha256: Option<&str>) -> AppResult<String> {
        if self.len == 0 {
            return Err(AppError::Firmware("empty image".into()));
        }
        // image shorter than the longest prefix
        if !self.started {
            self.start()?;
        }

        let digest = hex::encode(std::mem::take(&mut self.hasher).finalize());
        if let Some(expected) = expected_sha256 {
            if digest != expected {
                return Err(AppError::Firmware(format!(
                    "checksum mismatch: got {digest}, expected {expected}"
                )));
            }
        }

        self.sink.finish()?;
        self.started = false;
        Ok(digest)
    }

    fn abort(&mut self) {
        if self.started {
            warn!("Aborting partially written image ({} bytes received)", self.len);
            self.sink.abort();
            self.started = false;
        }
    }
}

impl ResponseSink for ImageStream<'_> {
    /// Refuses a failed download before anything reaches the sink.
    fn status(&mut self, status: u16) -> AppResult<()> {
        match status {
            200..=299 => Ok(()),
            _ => Err(AppError::Http(format!("image download status {status}"))),
        }
    }

    fn chunk(&mut self, chunk: &[u8]) -> AppResult<()> {
        self.hasher.update(chunk);
        self.len += chunk.len();
        if self.started {
            return self.sink.write(chunk);
        }

        self.head.extend_from_slice(chunk);
        if !self.head_ready() {
            return Ok(());
        }
        self.start()
    }
}


// EOF
