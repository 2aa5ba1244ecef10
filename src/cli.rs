//! Command-line argument parsing for the `chameleon` binary. Kept separate
//! from `main.rs` so `main` stays a thin dispatcher, the way the teacher's
//! `main.rs` already expects a `cli` module to exist.

use std::env;
use std::error::Error;
use std::fmt::{self, Display};
use std::path::PathBuf;

#[derive(Debug)]
pub enum CliError {
    MissingArgument(&'static str),
    InvalidArgument(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::MissingArgument(what) => {
                write!(f, "Error: missing required argument, {what}.")
            }
            CliError::InvalidArgument(msg) => write!(f, "Error: invalid argument, {msg}."),
        }
    }
}

impl Error for CliError {}

/// A parsed `chameleon <input> <output> [flags]` invocation.
#[derive(Debug, Clone)]
pub struct InputArguments {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub lenient: bool,
    pub interlace: bool,
    pub compression_level: u32,
}

impl InputArguments {
    /// Parses `std::env::args()`, skipping the program name.
    pub fn build() -> Result<Self, CliError> {
        Self::parse(env::args().skip(1))
    }

    fn parse(args: impl Iterator<Item = String>) -> Result<Self, CliError> {
        let mut positional = Vec::new();
        let mut lenient = false;
        let mut interlace = false;
        let mut compression_level = 6u32;

        let mut args = args.peekable();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--lenient" => lenient = true,
                "--interlace" => interlace = true,
                "--level" => {
                    let value = args
                        .next()
                        .ok_or(CliError::MissingArgument("a value after --level"))?;
                    compression_level = value.parse().map_err(|_| {
                        CliError::InvalidArgument(format!(
                            "'{value}' is not a valid compression level"
                        ))
                    })?;
                }
                _ => positional.push(arg),
            }
        }

        if positional.len() < 2 {
            return Err(CliError::MissingArgument("an <input> and an <output> path"));
        }

        Ok(Self {
            input_path: PathBuf::from(&positional[0]),
            output_path: PathBuf::from(&positional[1]),
            lenient,
            interlace,
            compression_level,
        })
    }
}

/// Prints usage information to stderr.
pub fn usage() {
    eprintln!("Usage: chameleon <input> <output> [--lenient] [--interlace] [--level N]");
    eprintln!();
    eprintln!("Converts between PNG and NetPBM (PPM/PAM) images based on file extension.");
    eprintln!("  --lenient     downgrade CRC/checksum mismatches to warnings instead of errors");
    eprintln!("  --interlace   write Adam7-interlaced PNG output");
    eprintln!("  --level N     zlib compression level 0-9 for PNG output (default 6)");
}
