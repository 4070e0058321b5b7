//! Shared CLI plumbing: docopt argument parsing and the crate's result type.

use docopt::Docopt;
use serde::de::DeserializeOwned;

pub type CliResult<T> = anyhow::Result<T>;

pub fn get_args<T>(usage: &str, argv: &[&str]) -> CliResult<T>
where
    T: DeserializeOwned,
{
    Docopt::new(usage)
        .and_then(|d| d.argv(argv.iter().copied()).version(Some(version())).deserialize())
        .map_err(Into::into)
}

fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
