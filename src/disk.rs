//! Client for the Yandex Disk REST API.

use crate::{
    api::{ApiError, Link, Resource},
    retry::RetryPolicy,
    token::Credential,
};
use log::{debug, error, info, warn};
use std::{error::Error, fmt, time::Instant};
use ureq::http::{self, HeaderValue, StatusCode};


pub static BASE_URL: &str = "https://cloud-api.yandex.net";

/// Error type for disk API operations
#[derive(Debug)]
pub enum DiskError {
    /// The token was rejected (401); it has been dropped from the client
    Unauthorized,
    /// An unexpected status code
    Status { status: StatusCode, body: String },
    /// The upload link response had no `href`
    MissingHref,
    /// Error from the HTTP client
    HttpError(ureq::Error),
    /// Error parsing a response body
    ParseError(serde_json::Error),
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiskError::Unauthorized => {
                write!(f, "Yandex Disk rejected the OAuth token")
            }
            DiskError::Status { status, body } => {
                write!(f, "Unexpected status {status}: {body}")
            }
            DiskError::MissingHref => {
                write!(f, "Upload link response contained no href")
            }
            DiskError::HttpError(e) => write!(f, "HTTP error: {}", e),
            DiskError::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl Error for DiskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DiskError::HttpError(e) => Some(e),
            DiskError::ParseError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ureq::Error> for DiskError {
    fn from(err: ureq::Error) -> Self {
        DiskError::HttpError(err)
    }
}

impl From<serde_json::Error> for DiskError {
    fn from(err: serde_json::Error) -> Self {
        DiskError::ParseError(err)
    }
}

/// Successful outcomes of [`DiskClient::create_folder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FolderStatus {
    Created,
    AlreadyExists,
}

/// Where the uploaded file's contents come from.
#[derive(Clone, Copy, Debug)]
pub enum UploadSource<'a> {
    /// Bytes we already have; sent via a temporary upload link.
    Bytes(&'a [u8]),
    /// A public URL the disk downloads itself.
    Url(&'a str),
}

/// Client for the Yandex Disk API. Owns the OAuth credential.
pub struct DiskClient {
    /// HTTP agent for making requests
    agent: ureq::Agent,
    /// Service root, without a trailing slash
    base_url: String,
    /// Cleared when the disk answers 401
    credential: Credential,
    /// How long to wait for an uploaded file to show up
    poll: RetryPolicy,
}

/// Status and body of a finished request.
struct Reply {
    status: StatusCode,
    body: String,
}

impl Reply {
    fn read(response: http::Response<ureq::Body>) -> Result<Self, DiskError> {
        let status = response.status();
        let body = response.into_body().read_to_string()?;
        Ok(Self { status, body })
    }

    fn describe(&self) -> String {
        ApiError::describe(&self.body)
    }

    fn into_status_error(self) -> DiskError {
        let body = self.describe();
        DiskError::Status {
            status: self.status,
            body,
        }
    }
}

impl DiskClient {
    pub fn with_base_url(credential: Credential, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let agent = crate::http::agent(crate::http::is_https(&base_url));
        Self {
            agent,
            base_url,
            credential,
            poll: RetryPolicy::default(),
        }
    }

    /// Replace the metadata polling policy.
    pub fn with_poll_policy(mut self, poll: RetryPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn resources_url(&self) -> String {
        format!("{}/v1/disk/resources", self.base_url)
    }

    fn upload_url(&self) -> String {
        format!("{}/v1/disk/resources/upload", self.base_url)
    }

    /// The `Authorization` header, or `Unauthorized` if the token is gone.
    fn auth(&self) -> Result<HeaderValue, DiskError> {
        if self.credential.is_empty() {
            return Err(DiskError::Unauthorized);
        }
        HeaderValue::try_from(format!("OAuth {}", self.credential.as_str()))
            .map_err(|_| DiskError::Unauthorized)
    }

    /// Drop the credential on a 401. Every later call fails fast.
    fn check_auth(&mut self, reply: &Reply) -> Result<(), DiskError> {
        if reply.status == StatusCode::UNAUTHORIZED {
            error!("Disk rejected the token: {}", reply.describe());
            self.credential = Credential::invalidated();
            return Err(DiskError::Unauthorized);
        }
        Ok(())
    }

    /// Create a folder. An existing folder counts as success.
    pub fn create_folder(&mut self, name: &str) -> Result<FolderStatus, DiskError> {
        debug!("Creating folder {name:?} on the disk");
        let response = self
            .agent
            .put(&self.resources_url())
            .header(http::header::AUTHORIZATION, self.auth()?)
            .query("path", name)
            .send_empty()?;
        let reply = Reply::read(response)?;
        self.check_auth(&reply)?;

        match reply.status {
            StatusCode::CREATED => {
                info!("Folder {name:?} created");
                Ok(FolderStatus::Created)
            }
            StatusCode::CONFLICT => {
                warn!("Folder {name:?} already exists");
                Ok(FolderStatus::AlreadyExists)
            }
            _ => {
                error!(
                    "Failed to create folder {name:?}: {} {}",
                    reply.status,
                    reply.describe()
                );
                Err(reply.into_status_error())
            }
        }
    }

    /// Upload a file to `remote_path`, overwriting anything already there.
    ///
    /// Completion is only acknowledged here; use
    /// [`DiskClient::poll_for_metadata`] to wait for the stored file.
    pub fn upload(
        &mut self,
        remote_path: &str,
        source: UploadSource<'_>,
    ) -> Result<(), DiskError> {
        let start_time = Instant::now();
        let reply = match source {
            UploadSource::Bytes(bytes) => self.upload_bytes(remote_path, bytes)?,
            UploadSource::Url(url) => self.upload_from_url(remote_path, url)?,
        };

        match reply.status {
            StatusCode::CREATED | StatusCode::ACCEPTED => {
                let duration = start_time.elapsed();
                info!("upload: {remote_path:?} accepted in {duration:?}");
                Ok(())
            }
            _ => {
                error!(
                    "Failed to upload {remote_path:?}: {} {}",
                    reply.status,
                    reply.describe()
                );
                Err(reply.into_status_error())
            }
        }
    }

    /// Request a temporary upload link, then `PUT` the bytes to it.
    fn upload_bytes(
        &mut self,
        remote_path: &str,
        bytes: &[u8],
    ) -> Result<Reply, DiskError> {
        debug!("Uploading {} bytes to {remote_path:?}", bytes.len());
        let response = self
            .agent
            .get(&self.upload_url())
            .header(http::header::AUTHORIZATION, self.auth()?)
            .query("path", remote_path)
            .query("overwrite", "true")
            .call()?;
        let reply = Reply::read(response)?;
        self.check_auth(&reply)?;

        if reply.status != StatusCode::OK {
            error!(
                "Failed to get an upload link for {remote_path:?}: {} {}",
                reply.status,
                reply.describe()
            );
            return Err(reply.into_status_error());
        }

        let link: Link = serde_json::from_str(&reply.body)?;
        if let Some(method) = link.method.as_deref() {
            if !method.eq_ignore_ascii_case("PUT") {
                warn!("Upload link wants {method}, sending PUT anyway");
            }
        }
        let href = link.href.filter(|h| !h.is_empty()).ok_or_else(|| {
            error!("Upload link for {remote_path:?} had no href");
            DiskError::MissingHref
        })?;

        // The link is pre-signed; it takes no Authorization header
        let response = self.agent.put(&href).send(bytes)?;
        Reply::read(response)
    }

    /// Ask the disk to download `url` into `remote_path` itself.
    fn upload_from_url(
        &mut self,
        remote_path: &str,
        url: &str,
    ) -> Result<Reply, DiskError> {
        debug!("Asking the disk to fetch {url} into {remote_path:?}");
        let response = self
            .agent
            .post(&self.upload_url())
            .header(http::header::AUTHORIZATION, self.auth()?)
            .query("path", remote_path)
            .query("url", url)
            .send_empty()?;
        let reply = Reply::read(response)?;
        self.check_auth(&reply)?;
        Ok(reply)
    }

    /// Wait for `remote_path` to exist and return its metadata.
    ///
    /// Polls per the client's [`RetryPolicy`]. Transport failures count as
    /// "not there yet". Returns `Ok(None)` if the file never showed up within
    /// the budget.
    pub fn poll_for_metadata(
        &mut self,
        remote_path: &str,
    ) -> Result<Option<Resource>, DiskError> {
        let policy = self.poll;
        let found = policy.poll(|attempt| -> Result<_, DiskError> {
            let reply = self
                .agent
                .get(&self.resources_url())
                .header(http::header::AUTHORIZATION, self.auth()?)
                .query("path", remote_path)
                .call()
                .map_err(DiskError::from)
                .and_then(Reply::read);
            let reply = match reply {
                Ok(reply) => reply,
                Err(DiskError::HttpError(err)) => {
                    warn!(
                        "Checking {remote_path:?} failed (attempt {attempt}/{}): {err}",
                        policy.max_attempts
                    );
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
            self.check_auth(&reply)?;

            if reply.status == StatusCode::OK {
                let resource: Resource = serde_json::from_str(&reply.body)?;
                return Ok(Some(resource));
            }
            debug!(
                "Metadata for {remote_path:?} not ready (attempt {attempt}/{}): {}",
                policy.max_attempts, reply.status
            );
            Ok(None)
        })?;

        match &found {
            Some(resource) => info!(
                "{} stored at {}, {} bytes ({})",
                resource.name,
                resource.path,
                resource.size,
                resource.mime_type.as_deref().unwrap_or("unknown type")
            ),
            None => error!(
                "{remote_path:?} did not appear after {} attempts",
                policy.max_attempts
            ),
        }
        Ok(found)
    }
}
