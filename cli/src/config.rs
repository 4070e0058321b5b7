//! Shared CLI configuration: the `--delimiter` flag type and the glue that
//! turns command-line flags into a [`waka_csv_core::ReaderOptions`].

use std::fmt;
use std::path::PathBuf;

use serde::de::{Deserialize, Deserializer, Error};
use waka_csv_core::{QuoteMode, ReaderOptions, Trimming};

/// A single-byte field delimiter parsed from a docopt flag (`--delimiter ;`
/// or `--delimiter '\t'`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delimiter(pub u8);

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

impl<'de> Deserialize<'de> for Delimiter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            r"\t" => Ok(Delimiter(b'\t')),
            s if s.len() == 1 => Ok(Delimiter(s.as_bytes()[0])),
            _ => Err(D::Error::custom(format!(
                "could not convert '{raw}' to a single-byte delimiter"
            ))),
        }
    }
}

/// Resolved input: either a path or stdin (`-`).
#[derive(Debug, Clone)]
pub enum Input {
    Stdin,
    Path(PathBuf),
}

impl Input {
    pub fn resolve(arg: Option<&str>) -> Input {
        match arg {
            None | Some("-") => Input::Stdin,
            Some(path) => Input::Path(PathBuf::from(path)),
        }
    }

    pub fn open_source(&self) -> waka_csv_core::Source {
        match self {
            Input::Stdin => waka_csv_core::Source::from_reader(std::io::stdin()),
            Input::Path(p) => waka_csv_core::Source::from_path(p.clone()),
        }
    }

    /// Infers a delimiter from the path's extension (`.tsv` -> tab, `.psv`
    /// -> pipe), ignoring a trailing `.gz`/`.bz2`/`.zst`/`.xz`. Stdin has no
    /// extension to infer from.
    fn inferred_delimiter(&self) -> Option<Delimiter> {
        let Input::Path(path) = self else { return None };
        let mut stem = path.clone();
        for ext in ["gz", "bz2", "zst", "xz"] {
            if stem.extension().and_then(|e| e.to_str()) == Some(ext) {
                stem.set_extension("");
            }
        }
        match stem.extension().and_then(|e| e.to_str()) {
            Some("tsv") => Some(Delimiter(b'\t')),
            Some("psv") => Some(Delimiter(b'|')),
            _ => None,
        }
    }
}

/// Builds the common subset of [`ReaderOptions`] shared by every subcommand.
///
/// `delimiter` (an explicit `--delimiter` flag) always wins; absent that,
/// `input`'s extension is consulted (`.tsv`/`.psv`) the way `medialab-xan`'s
/// `Config::new` infers a delimiter from the path before falling back to the
/// default comma.
pub fn reader_options(
    delimiter: Option<Delimiter>,
    input: &Input,
    no_headers: bool,
    flexible: bool,
) -> ReaderOptions {
    let mismatched = if flexible {
        waka_csv_core::MismatchedFieldPolicy::PadOrTruncate
    } else {
        waka_csv_core::MismatchedFieldPolicy::Throw
    };
    let mut opts = ReaderOptions::builder()
        .has_header_row(!no_headers)
        .quote_mode(QuoteMode::Lenient)
        .trimming(Trimming::None)
        .mismatched_field(mismatched)
        .build();
    if let Some(d) = delimiter.or_else(|| input.inferred_delimiter()) {
        opts.delimiter = (d.as_byte() as char).to_string();
    }
    opts
}
