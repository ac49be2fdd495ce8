// CLASSIFICATION: COMMUNITY
// Filename: resolve.rs v0.3
// Author: Lukas Bower
// Date Modified: 2027-04-11

//! Insertion-point resolution.
//!
//! Each `-d`/`-D` argument names a host source and, optionally after a
//! colon, the volume directory it grafts into. A destination that does
//! not resolve is a configuration error and fatal, unlike per-entry
//! problems.

use std::path::PathBuf;

use crate::error::VolError;
use crate::volume::{NodeId, Volume};

/// Parsed `source[:destination]` insertion argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertSpec {
    /// Host directory or device-table file.
    pub source: PathBuf,
    /// Volume destination path; `None` means the volume root.
    pub dest: Option<String>,
}

impl InsertSpec {
    /// Split an argument on its first colon.
    pub fn parse(arg: &str) -> InsertSpec {
        match arg.split_once(':') {
            Some((source, dest)) if !dest.is_empty() => InsertSpec {
                source: PathBuf::from(source),
                dest: Some(dest.to_string()),
            },
            Some((source, _)) => InsertSpec {
                source: PathBuf::from(source),
                dest: None,
            },
            None => InsertSpec {
                source: PathBuf::from(arg),
                dest: None,
            },
        }
    }

    /// Resolve the destination against the volume root.
    pub fn resolve_dest<V>(&self, vol: &V) -> Result<NodeId, VolError>
    where
        V: Volume + ?Sized,
    {
        match &self.dest {
            None => Ok(vol.root()),
            Some(dest) => vol
                .resolve(vol.root(), dest)
                .ok_or_else(|| VolError::PathNotFound(dest.clone())),
        }
    }
}
