//! Yandex Disk OAuth token storage.
//!
//! The token lives in a single-line plaintext file in the platform config
//! directory (`~/.config/catcap/token` on Linux). An empty file means the
//! token was rejected and must be entered again.

use directories::ProjectDirs;
use log::{debug, info, warn};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::{
    error::Error,
    fmt, fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

const TOKEN_FILE_NAME: &str = "token";
const APPLICATION: &str = "catcap";

/// An OAuth token for the disk API. Never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// The state left behind after the disk rejected the token.
    pub fn invalidated() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Where the token in use came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// `--token` or `YANDEX_DISK_TOKEN` (possibly via `.env`)
    Flag,
    /// The token file, or a prompt whose answer was saved there
    Stored,
}

/// Errors that can occur while loading or saving the token.
#[derive(Debug)]
pub enum TokenError {
    /// Could not determine the token file location
    NoLocation,
    /// The user didn't enter a token
    Empty,
    /// I/O error accessing the token file or the terminal
    Io(io::Error),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::NoLocation => {
                write!(f, "Could not determine the token file location")
            }
            TokenError::Empty => write!(f, "No Yandex Disk token was entered"),
            TokenError::Io(err) => {
                write!(f, "I/O error accessing token file: {err}")
            }
        }
    }
}

impl Error for TokenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TokenError::Io(err) => Some(err),
            TokenError::NoLocation | TokenError::Empty => None,
        }
    }
}

impl From<io::Error> for TokenError {
    fn from(err: io::Error) -> Self {
        TokenError::Io(err)
    }
}

/// Gets the platform-specific path to the token file.
///
/// Returns `None` if there's no home directory to anchor it to.
pub fn default_token_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", APPLICATION)?;
    Some(dirs.config_dir().join(TOKEN_FILE_NAME))
}

pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A store at the platform default location.
    pub fn open_default() -> Result<Self, TokenError> {
        default_token_path()
            .map(Self::new)
            .ok_or(TokenError::NoLocation)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored token, or `None` if the file is missing or empty.
    pub fn load(&self) -> Result<Option<Credential>, TokenError> {
        debug!("Reading token from: {}", self.path.display());
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(ref err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(err) => return Err(TokenError::Io(err)),
        };
        let credential = Credential::new(contents);
        Ok((!credential.is_empty()).then_some(credential))
    }

    /// Returns the stored token, prompting on `output` (and saving the answer
    /// read from `input`) if there isn't one.
    pub fn get_token_with(
        &self,
        input: &mut impl BufRead,
        output: &mut impl Write,
    ) -> Result<Credential, TokenError> {
        if let Some(credential) = self.load()? {
            return Ok(credential);
        }
        let credential = prompt_token(input, output)?;
        self.save(&credential)?;
        Ok(credential)
    }

    /// Writes the token, creating the parent directory if needed.
    pub fn save(&self, credential: &Credential) -> Result<(), TokenError> {
        if credential.is_empty() {
            self.write(b"")?;
        } else {
            self.write(format!("{}\n", credential.as_str()).as_bytes())?;
        }
        info!("Token saved to: {}", self.path.display());
        Ok(())
    }

    /// Empties the token file so the next run asks for a new token.
    pub fn invalidate(&self) -> Result<(), TokenError> {
        self.write(b"")?;
        warn!(
            "Yandex Disk rejected the token; cleared {}",
            self.path.display()
        );
        Ok(())
    }

    fn write(&self, contents: &[u8]) -> Result<(), TokenError> {
        if let Some(parent_dir) = self.path.parent() {
            if !parent_dir.as_os_str().is_empty() {
                fs::create_dir_all(parent_dir)?;
            }
        }

        let mut file_opts = fs::OpenOptions::new();
        file_opts.write(true).create(true).truncate(true);

        // The file holds a secret, so set permissions to -rw--------
        #[cfg(unix)]
        file_opts.mode(0o600);

        let mut file = file_opts.open(&self.path)?;
        file.write_all(contents)?;
        Ok(())
    }
}

/// Ask for a token on `output` and read it from `input`.
pub fn prompt_token(
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<Credential, TokenError> {
    write!(output, "Enter your Yandex Disk OAuth token: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let credential = Credential::new(line);
    if credential.is_empty() {
        return Err(TokenError::Empty);
    }
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn temp_store(temp_dir: &tempfile::TempDir) -> TokenStore {
        TokenStore::new(temp_dir.path().join(TOKEN_FILE_NAME))
    }

    #[test]
    fn test_default_path_ends_with_app_dir() {
        if let Some(path) = default_token_path() {
            assert!(path.ends_with(Path::new(TOKEN_FILE_NAME)));
            assert!(path.to_string_lossy().contains(APPLICATION));
        }
    }

    #[test]
    fn test_existing_token_is_trimmed() {
        let temp_dir = tempdir().unwrap();
        let store = temp_store(&temp_dir);
        fs::write(store.path(), "  y0_abc123 \n").unwrap();

        let mut input = io::Cursor::new(Vec::new());
        let mut output = Vec::new();
        let credential = store.get_token_with(&mut input, &mut output).unwrap();

        assert_eq!(credential.as_str(), "y0_abc123");
        // No prompt was shown
        assert!(output.is_empty());
    }

    #[test]
    fn test_missing_token_prompts_and_saves() {
        let temp_dir = tempdir().unwrap();
        let store = temp_store(&temp_dir);

        let mut input = io::Cursor::new(b"y0_fresh\n".to_vec());
        let mut output = Vec::new();
        let credential = store.get_token_with(&mut input, &mut output).unwrap();

        assert_eq!(credential.as_str(), "y0_fresh");
        assert!(String::from_utf8(output).unwrap().contains("token"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "y0_fresh\n");

        #[cfg(unix)]
        {
            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "Permissions should be 0o600");
        }
    }

    #[test]
    fn test_empty_answer_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let store = temp_store(&temp_dir);

        let mut input = io::Cursor::new(b"   \n".to_vec());
        let result = store.get_token_with(&mut input, &mut Vec::new());
        assert!(matches!(result, Err(TokenError::Empty)));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_invalidate_forces_prompt() {
        let temp_dir = tempdir().unwrap();
        let store = temp_store(&temp_dir);
        store.save(&Credential::new("y0_old")).unwrap();

        store.invalidate().unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
        assert_eq!(store.load().unwrap(), None);

        let mut input = io::Cursor::new(b"y0_new\n".to_vec());
        let mut output = Vec::new();
        let credential = store.get_token_with(&mut input, &mut output).unwrap();

        assert_eq!(credential.as_str(), "y0_new");
        assert!(!output.is_empty(), "should have prompted");
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("y0_secret");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
        assert_eq!(
            format!("{:?}", Credential::invalidated()),
            "Credential(<empty>)"
        );
    }
}
