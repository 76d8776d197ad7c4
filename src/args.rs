use crate::errors::*;
use clap::{ArgAction, CommandFactory, Parser};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

/// This tool will check your ClusterServiceVersion's deployment containers for
/// images referenced using a tag, and replace the tag with the digest of the
/// image at that point in time.
///
/// The manifest is rewritten in place, the replaced tags are kept as comments
/// next to the image and the status section is removed.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Increase logging output (can be used multiple times)
    #[arg(short, long, global = true, action(ArgAction::Count))]
    pub verbose: u8,
    /// Path to the ClusterServiceVersion to modify, or `help`/`version`
    pub path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Action<'a> {
    Usage,
    Version,
    Pin(&'a PathBuf),
}

impl Args {
    /// Parse the command line, `None` if clap already answered with help or version
    pub fn from_args<I, T>(args: I) -> Result<Option<Args>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match Args::try_parse_from(args) {
            Ok(args) => Ok(Some(args)),
            Err(err) if err.use_stderr() => Err(err).context(ErrorKind::Argument),
            Err(err) => {
                err.print().context("Failed to print help")?;
                Ok(None)
            }
        }
    }

    pub fn action(&self) -> Action<'_> {
        let token = self.path.to_str().map(str::to_lowercase);
        match token.as_deref() {
            Some("help") => Action::Usage,
            Some("version") => Action::Version,
            _ => Action::Pin(&self.path),
        }
    }

    pub fn print_usage<W: io::Write>(mut w: W) -> io::Result<()> {
        write!(w, "{}", Args::command().render_long_help())
    }
}
