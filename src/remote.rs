use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_DISPOSITION, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::error::MirrorError;
use crate::layout;

/// Transport seam between the mirror engine and the OCADS web server.
pub trait RemoteSource: Send + Sync {
    /// Fetches a document (listing page or index) as text.
    fn fetch_text(&self, url: &str) -> Result<String, MirrorError>;

    /// Downloads `url` into `output_dir` and returns the written path.
    fn download(&self, url: &str, output_dir: &Utf8Path) -> Result<Utf8PathBuf, MirrorError>;

    /// Local file name `download` would pick for `url`, without fetching the
    /// body.
    fn resolve_name(&self, url: &str) -> Result<String, MirrorError>;
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    max_retries: usize,
}

impl HttpRemote {
    pub fn new(settings: &HttpSettings) -> Result<Self, MirrorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ocads-mirror/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| MirrorError::FetchHttp {
                    url: String::new(),
                    message: err.to_string(),
                })?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| MirrorError::FetchHttp {
                url: String::new(),
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            max_retries: settings.max_retries,
        })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, reqwest::Error>
    where
        F: FnMut() -> RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        warn!(status, attempt, "retrying after server error");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        warn!(error = %err, attempt, "retrying after transport error");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl RemoteSource for HttpRemote {
    fn fetch_text(&self, url: &str) -> Result<String, MirrorError> {
        debug!(url, "fetching document");
        let response = self
            .send_with_retries(|| self.client.get(url))
            .map_err(|err| MirrorError::FetchHttp {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(MirrorError::FetchStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.text().map_err(|err| MirrorError::FetchHttp {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    fn download(&self, url: &str, output_dir: &Utf8Path) -> Result<Utf8PathBuf, MirrorError> {
        debug!(url, dir = %output_dir, "downloading file");
        let mut response = self
            .send_with_retries(|| self.client.get(url))
            .map_err(|err| MirrorError::DownloadHttp {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(MirrorError::DownloadStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let hint = disposition_hint(response.headers());
        let name = layout::resolve_file_name(hint.as_deref(), url)?;
        let destination = output_dir.join(name);

        let mut temp = tempfile::Builder::new()
            .prefix(".ocads-part")
            .tempfile_in(output_dir.as_std_path())
            .map_err(|err| MirrorError::Filesystem(format!("temp file in {output_dir}: {err}")))?;
        std::io::copy(&mut response, temp.as_file_mut()).map_err(|err| {
            MirrorError::DownloadHttp {
                url: url.to_string(),
                message: err.to_string(),
            }
        })?;
        temp.persist(destination.as_std_path())
            .map_err(|err| MirrorError::Filesystem(format!("persist {destination}: {err}")))?;
        Ok(destination)
    }

    fn resolve_name(&self, url: &str) -> Result<String, MirrorError> {
        let response = self
            .send_with_retries(|| self.client.head(url))
            .map_err(|err| MirrorError::FetchHttp {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        if !response.status().is_success() {
            debug!(url, status = response.status().as_u16(), "no name hint, using URL segment");
            return layout::file_name_from_url(url);
        }
        let hint = disposition_hint(response.headers());
        layout::resolve_file_name(hint.as_deref(), url)
    }
}

fn disposition_hint(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(layout::file_name_from_disposition)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
