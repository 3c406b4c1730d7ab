use log::{debug, error, info};
use std::error::Error;
use std::fmt;
use std::time::Instant;

pub static BASE_URL: &str = "https://cataas.com";

/// Cat images are small; anything bigger than this is not a cat.
const MAX_IMAGE_SIZE: u64 = 20 << 20; // 20 MiB

/// Error type for the cat image client
#[derive(Debug)]
pub enum CatError {
    /// Error from the HTTP client
    HttpError(ureq::Error),
}

impl fmt::Display for CatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatError::HttpError(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

impl Error for CatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CatError::HttpError(e) => Some(e),
        }
    }
}

impl From<ureq::Error> for CatError {
    fn from(err: ureq::Error) -> Self {
        CatError::HttpError(err)
    }
}

/// Client for the "cat as a service" captioned image endpoint
pub struct CatClient {
    /// HTTP agent for making requests
    agent: ureq::Agent,
    /// Service root, without a trailing slash
    base_url: String,
}

impl CatClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let agent = crate::http::agent(crate::http::is_https(&base_url));
        Self { agent, base_url }
    }

    /// The URL of a cat image with `caption` written on it.
    pub fn image_url(&self, caption: &str) -> String {
        format!("{}/cat/says/{}", self.base_url, urlencoding::encode(caption))
    }

    /// Download a cat image with `caption` written on it.
    ///
    /// A non-success status is logged but the body is still returned; the
    /// caller decides what to do with it. Only transport failures are errors.
    pub fn fetch(&self, caption: &str) -> Result<Vec<u8>, CatError> {
        let url = self.image_url(caption);
        debug!("Downloading cat image with caption {caption:?} from {url}");

        let start_time = Instant::now();
        let response = self.agent.get(&url).call()?;
        let status = response.status();

        let mut body = response.into_body();
        let bytes = body
            .with_config()
            .limit(MAX_IMAGE_SIZE)
            .read_to_vec()?;
        let duration = start_time.elapsed();

        if status.is_success() {
            info!(
                "fetch: got {} byte image in {duration:?} for {caption:?}",
                bytes.len()
            );
        } else {
            error!(
                "fetch: cat image request failed with {status}: {}",
                String::from_utf8_lossy(&bytes).trim()
            );
        }
        Ok(bytes)
    }
}

impl Default for CatClient {
    fn default() -> Self {
        Self::new()
    }
}
