use crate::{
    cataas::{self, CatClient},
    cli::progress::Steps,
    disk::{self, DiskClient},
    ledger::{Ledger, Summary, DEFAULT_LEDGER_PATH},
    pipeline::{Pipeline, UploadMode},
    retry::{self, RetryPolicy},
    token::{self, Credential, CredentialSource, TokenStore},
};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use indicatif::MultiProgress;
use log::{error, info, warn};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Duration,
};

pub mod input;
mod progress;
pub mod sanitize;

// Default values for CLI options
const DEFAULT_FOLDER: &str = "catcap";

/// Fetch cat pictures with captions from cataas.com, store them on Yandex
/// Disk, and record each stored file's size in a local JSON ledger.
///
/// With no CAPTION arguments, captions are read interactively, one per line,
/// until "0" is entered.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Text to write on the cat. Repeatable. Use '@<path>' to read one caption
    /// per line from a file.
    pub captions: Vec<input::CaptionArg>,

    /// Yandex Disk OAuth token (overrides the saved token)
    #[arg(short = 't', long, env = "YANDEX_DISK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Where the token is saved [default: <config dir>/catcap/token]
    #[arg(long, env = "CATCAP_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Save the token (from --token or a prompt) to the token file and exit.
    #[arg(long, default_value_t = false)]
    pub setup: bool,

    /// Disk folder that receives the images
    #[arg(short, long, env = "CATCAP_FOLDER", default_value = DEFAULT_FOLDER)]
    pub folder: String,

    /// JSON file that records the name and size of every stored image
    #[arg(long, env = "CATCAP_LEDGER", default_value = DEFAULT_LEDGER_PATH)]
    pub ledger: PathBuf,

    /// How images get onto the disk
    #[arg(short, long, env = "CATCAP_MODE", value_enum, default_value_t)]
    pub mode: UploadMode,

    /// Also keep downloaded images in this directory (local mode only)
    #[arg(long, env = "CATCAP_SAVE_DIR")]
    pub save_dir: Option<PathBuf>,

    /// How many times to check whether an upload has landed
    #[arg(long, default_value_t = retry::DEFAULT_MAX_ATTEMPTS)]
    pub poll_attempts: u32,

    /// Milliseconds between upload checks
    #[arg(long, default_value_t = retry::DEFAULT_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,

    /// Append timestamped log lines to this file instead of stderr
    #[arg(long, env = "CATCAP_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Cat image service root
    #[arg(long, env = "CATCAP_CAT_URL", default_value = cataas::BASE_URL, hide = true)]
    pub cat_url: String,

    /// Disk API root
    #[arg(long, env = "CATCAP_DISK_URL", default_value = disk::BASE_URL, hide = true)]
    pub disk_url: String,

    // Parse --verbose and --quiet flags. Default to INFO log level.
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Cli {
    pub fn run(self, progress: &MultiProgress) -> anyhow::Result<()> {
        let tokens = match &self.token_file {
            Some(path) => TokenStore::new(path),
            None => TokenStore::open_default()?,
        };

        let stdin = io::stdin();
        let stderr = io::stderr();

        // If --setup is provided, store the token and exit
        if self.setup {
            setup_token(
                self.token.as_deref(),
                &tokens,
                &mut stdin.lock(),
                &mut stderr.lock(),
            )?;
            println!("Token saved to {}", tokens.path().display());
            return Ok(());
        }

        let (credential, token_source) = resolve_token(
            self.token.as_deref(),
            &tokens,
            &mut stdin.lock(),
            &mut stderr.lock(),
        )?;

        if self.save_dir.is_some() && self.mode == UploadMode::Remote {
            warn!("Ignoring --save-dir; it only applies with --mode local.");
        }

        let captions = if self.captions.is_empty() {
            progress.suspend(|| input::prompt(&mut stdin.lock(), &mut stderr.lock()))?
        } else {
            input::collect(self.captions)?
        };
        if captions.is_empty() {
            warn!("No captions given, nothing to do");
            return Ok(());
        }

        let poll = RetryPolicy::new(
            self.poll_attempts,
            Duration::from_millis(self.poll_interval_ms),
        );
        let mut pipeline = Pipeline {
            cats: CatClient::with_base_url(&self.cat_url),
            disk: DiskClient::with_base_url(credential, &self.disk_url)
                .with_poll_policy(poll),
            ledger: Ledger::new(self.ledger),
            tokens,
            token_source,
            mode: self.mode,
            folder: self.folder,
            save_dir: self.save_dir,
        };

        let summary = run_all(&mut pipeline, &captions, progress);
        println!(
            "Uploaded {} file(s), total size {} bytes",
            summary.files, summary.total_size
        );
        Ok(())
    }
}

/// Pick the token to use: CLI > environment variable > token file > prompt.
///
/// A prompted token is saved to the token file.
fn resolve_token(
    flag: Option<&str>,
    tokens: &TokenStore,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<(Credential, CredentialSource)> {
    let (credential, source) = match flag {
        Some(token) => (Credential::new(token), CredentialSource::Flag),
        None => (tokens.get_token_with(input, output)?, CredentialSource::Stored),
    };
    if credential.is_empty() {
        anyhow::bail!("The Yandex Disk token is empty");
    }
    Ok((credential, source))
}

/// Save the token from `flag`, or a freshly prompted one, replacing whatever
/// the token file held.
fn setup_token(
    flag: Option<&str>,
    tokens: &TokenStore,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<Credential> {
    let credential = match flag {
        Some(token) => Credential::new(token),
        None => token::prompt_token(input, output)?,
    };
    if credential.is_empty() {
        anyhow::bail!("The Yandex Disk token is empty");
    }
    tokens.save(&credential)?;
    Ok(credential)
}

/// Push every caption through the pipeline, one at a time. A failed caption
/// is logged and skipped.
fn run_all(
    pipeline: &mut Pipeline,
    captions: &[String],
    progress: &MultiProgress,
) -> Summary {
    let mut stored = 0;
    for (i, caption) in captions.iter().enumerate() {
        info!("[{}/{}] Processing {caption:?}", i + 1, captions.len());
        let steps = Steps::new(progress, caption);
        match pipeline.process(caption, |stage| steps.advance(stage)) {
            Ok(Some(_)) => stored += 1,
            Ok(None) => warn!("✗ {caption:?} was not confirmed; not recorded"),
            Err(err) => {
                error!("✗ {caption:?} failed: {err:#}");
                if pipeline.disk.credential().is_empty() {
                    warn!(
                        "The token was rejected; the remaining captions \
                         will fail until it is replaced"
                    );
                }
            }
        }
    }
    info!("{stored} of {} caption(s) stored", captions.len());

    let records = pipeline.ledger.read();
    Summary::of_last(&records, captions.len())
}
