// esp/http.rs

use embedded_svc::{
    http::{client::Client, Status},
    io::Read,
};
use esp_idf_svc::http::client::{Configuration, EspHttpConnection, FollowRedirectsPolicy};

use crate::*;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const READ_CHUNK: usize = 1024;

/// Blocking HTTPS GET with the IDF certificate bundle. Redirects are
/// followed, which the spreadsheet endpoint relies on.
#[derive(Default)]
pub struct EspHttp;

impl EspHttp {
    pub fn new() -> Self {
        Self
    }

    fn connect(&self) -> AppResult<Client<EspHttpConnection>> {
        let conf = Configuration {
            timeout: Some(HTTP_TIMEOUT),
            crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
            follow_redirects_policy: FollowRedirectsPolicy::FollowGetHead,
            ..Default::default()
        };
        Ok(Client::wrap(EspHttpConnection::new(&conf)?))
    }
}

impl HttpClient for EspHttp {
    fn get(&mut self, url: &str, sink: &mut dyn ResponseSink) -> AppResult<u16> {
        let mut client = self.connect()?;
        let request = client
            .get(url)
            .map_err(|e| AppError::Http(format!("GET {url}: {e:?}")))?;
        let mut response = request
            .submit()
            .map_err(|e| AppError::Http(format!("GET {url}: {e:?}")))?;
        let status = response.status();
        debug!("GET {url} -> {status}");
        sink.status(status)?;

        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| AppError::Http(format!("reading {url}: {e:?}")))?;
            if n == 0 {
                break;
            }
            sink.chunk(&buf[..n])?;
        }
        Ok(status)
    }
}

// EOF
