use serde::{Deserialize, Serialize};


/// Response from `GET /v1/disk/resources/upload`: a temporary target that
/// accepts the file bytes via `PUT`.
#[derive(Debug, Deserialize)]
pub struct Link {
    /// The URL to send the request to
    pub href: Option<String>,

    /// The HTTP method to use with `href` (normally `PUT`)
    #[serde(default)]
    pub method: Option<String>,
}

/// Metadata for a single file or folder on the disk, from
/// `GET /v1/disk/resources`. Only the fields we use are kept.
#[derive(Debug, Deserialize)]
pub struct Resource {
    /// The resource name, e.g. `Hello_World.jpg`
    #[serde(default)]
    pub name: String,

    /// The full path on the disk, e.g. `disk:/catcap/Hello_World.jpg`
    #[serde(default)]
    pub path: String,

    /// The file size in bytes. Absent for folders.
    #[serde(default)]
    pub size: u64,

    /// The MIME type detected by the disk
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Error body returned by the disk API for non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code, e.g. `DiskPathPointsToExistentDirectoryError`
    pub error: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

impl ApiError {
    /// Render a status body for logging. Falls back to the raw text when the
    /// body isn't the usual JSON error shape.
    pub fn describe(body: &str) -> String {
        match serde_json::from_str::<ApiError>(body) {
            Ok(err) if err.description.is_empty() => err.error,
            Ok(err) => format!("{}: {}", err.error, err.description),
            Err(_) => body.trim().to_string(),
        }
    }
}

/// One stored file, as recorded in the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// The file name on the disk (without the folder)
    pub name: String,

    /// The stored size in bytes
    pub size: u64,
}
