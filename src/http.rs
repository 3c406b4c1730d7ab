use std::time::Duration;
use ureq::tls::{TlsConfig, TlsProvider};

const TIMEOUT: Duration = Duration::from_secs(60);

/// Build the blocking HTTP agent shared by the API clients.
///
/// Non-2xx statuses are returned as ordinary responses; both APIs signal
/// outcomes through status codes, so callers branch on them directly.
pub fn agent(https_only: bool) -> ureq::Agent {
    let config = ureq::config::Config::builder()
        .https_only(https_only)
        .http_status_as_error(false)
        .timeout_global(Some(TIMEOUT))
        .tls_config(TlsConfig::builder().provider(TlsProvider::NativeTls).build())
        .build();
    ureq::Agent::new_with_config(config)
}

/// Only insist on TLS when talking to a real `https://` endpoint.
pub fn is_https(base_url: &str) -> bool {
    base_url.starts_with("https://")
}
