pub use anyhow::{anyhow, bail, Context as _, Error, Result};
pub use log::{debug, error, info, trace, warn};

use std::fmt;

/// Failure class of an aborted run, attached to the error chain as context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Read,
    Decode,
    ReferenceParse,
    RegistryLookup,
    Encode,
    Write,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Argument => 10,
            ErrorKind::Read => 20,
            ErrorKind::Decode => 30,
            ErrorKind::ReferenceParse => 40,
            ErrorKind::RegistryLookup => 50,
            ErrorKind::Encode => 60,
            ErrorKind::Write => 70,
        }
    }

    /// Find the failure class anywhere in the context chain of an error
    pub fn of(err: &Error) -> Option<Self> {
        err.downcast_ref::<ErrorKind>().copied()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::Argument => "Invalid command line arguments",
            ErrorKind::Read => "Unable to read manifest",
            ErrorKind::Decode => "Manifest is not a valid ClusterServiceVersion",
            ErrorKind::ReferenceParse => "Unable to parse image reference",
            ErrorKind::RegistryLookup => "Unable to query the registry",
            ErrorKind::Encode => {
                "Unable to render the manifest, this is an internal error and should be reported as a bug"
            }
            ErrorKind::Write => "Unable to overwrite manifest",
        };
        f.write_str(msg)
    }
}
