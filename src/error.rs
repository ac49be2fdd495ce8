// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-05-14

//! Error taxonomy for volume population.
//!
//! Everything here is fatal to the run when it reaches the driver.
//! Recoverable events (a bad device-table line, an unsupported host
//! entry) are logged at their source and never become a `VolError`.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal population errors.
#[derive(Debug, Error)]
pub enum VolError {
    /// Host filesystem I/O failure, with the path that triggered it.
    #[error("{path}: {source}")]
    HostIo {
        /// Host path being read when the failure occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The volume image could not be opened, parsed, or written back.
    #[error("volume image {path}: {reason}")]
    Image {
        /// Image file path.
        path: PathBuf,
        /// Human-readable failure description.
        reason: String,
    },

    /// A volume path did not resolve to an existing node.
    #[error("path {0} not found in filesystem")]
    PathNotFound(String),

    /// A referenced node id is not live in the volume.
    #[error("no such node {0} in volume")]
    BadNode(u32),

    /// An entry name collides with an existing node of another type.
    #[error("node '{0}' already exists and isn't of the same type")]
    TypeMismatch(String),

    /// An entry name collides with an existing node of the same type
    /// where the caller did not ask for a fixup.
    #[error("node '{0}' already exists")]
    Exists(String),

    /// Entry name is empty, ".", "..", or contains a separator.
    #[error("invalid entry name '{0}'")]
    BadName(String),

    /// The target of a link or recursion is not a directory.
    #[error("node '{0}' is not a directory")]
    NotADirectory(String),

    /// Directory has no space left for another entry. The synthesizer
    /// retries after an expand; this only escapes if expansion fails.
    #[error("no space left in directory")]
    DirFull,

    /// Inline payload handed to the backend exceeds its capacity.
    #[error("inline payload for '{name}' is {len} bytes, capacity {capacity}")]
    InlineTooBig {
        /// Entry name being created.
        name: String,
        /// Payload length offered.
        len: usize,
        /// Inline bytes the backend can hold.
        capacity: usize,
    },

    /// Symlink content write came up short of the target length.
    #[error("short write on symlink '{name}': {written} of {expected} bytes")]
    ShortSymlink {
        /// Entry name of the symlink.
        name: String,
        /// Bytes actually recorded.
        written: u64,
        /// Target length expected.
        expected: u64,
    },

    /// An insertion source is neither a directory nor a regular file.
    #[error("{0} is neither a file nor a directory")]
    BadSource(PathBuf),
}

impl VolError {
    /// Wrap a host I/O error with its path.
    pub fn host_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VolError::HostIo {
            path: path.into(),
            source,
        }
    }
}
