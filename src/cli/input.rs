//! Caption input handling

use anyhow::Context;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Typing this at the interactive prompt ends input.
pub const STOP_WORD: &str = "0";

/// A caption argument: either literal text or `@<path>` to read one caption
/// per line from a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptionArg {
    Literal(String),
    File(PathBuf),
}

impl FromStr for CaptionArg {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix('@') {
            Some("") => Err(anyhow::anyhow!("Expected a file path after '@'")),
            Some(path) => Ok(CaptionArg::File(PathBuf::from(path))),
            None => Ok(CaptionArg::Literal(s.to_string())),
        }
    }
}

impl CaptionArg {
    fn read_captions(self) -> anyhow::Result<Vec<String>> {
        match self {
            CaptionArg::Literal(caption) => Ok(vec![caption]),
            CaptionArg::File(path) => {
                let contents =
                    std::fs::read_to_string(&path).with_context(|| {
                        format!(
                            "Failed to read captions from file: {}",
                            path.display()
                        )
                    })?;
                Ok(contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect())
            }
        }
    }
}

/// Expand caption arguments (reading any `@file`s) into the list of captions.
pub fn collect(args: Vec<CaptionArg>) -> anyhow::Result<Vec<String>> {
    let mut captions = Vec::new();
    for arg in args {
        captions.extend(arg.read_captions()?);
    }
    Ok(captions)
}

/// Ask for captions one line at a time until [`STOP_WORD`] or end of input.
/// Blank lines are skipped.
pub fn prompt(
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> anyhow::Result<Vec<String>> {
    let mut captions = Vec::new();
    loop {
        write!(
            output,
            "Caption for cat #{} ({STOP_WORD} to finish): ",
            captions.len() + 1
        )?;
        output.flush()?;

        let mut line = String::new();
        if input
            .read_line(&mut line)
            .context("Failed to read caption from stdin")?
            == 0
        {
            writeln!(output)?;
            break;
        }

        let caption = line.trim();
        if caption == STOP_WORD {
            break;
        }
        if !caption.is_empty() {
            captions.push(caption.to_string());
        }
    }
    Ok(captions)
}
