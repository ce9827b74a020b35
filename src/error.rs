// Error taxonomy for the library side of the tool. The UI layer converts
// these into `anyhow` errors only where a failure must end the session.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The OS port enumeration command could not be started.
    #[error("could not run port enumeration command `{command}`: {source}")]
    PortScan {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("could not enumerate serial ports: {0}")]
    SerialPorts(#[source] serialport::Error),

    /// Scanning gave up after a bounded number of empty scans.
    #[error("no serial port appeared after {attempts} scans")]
    NoPorts { attempts: u32 },

    /// The device tool exited with a non-zero status (or could not start).
    #[error("`{command}` failed: {detail}")]
    Tool { command: String, detail: String },

    /// The device tool exited cleanly but returned nothing except stderr.
    #[error("could not read '{path}' from the device: {detail}")]
    SoftFailure { path: String, detail: String },

    #[error("{}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("source directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to read operator input: {0}")]
    Prompt(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }
}
