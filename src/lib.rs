// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v0.7
// Author: Lukas Bower
// Date Modified: 2027-05-02

//! volgen - populate a filesystem volume from host trees and device tables.
//!
//! The core translates host filesystem metadata (type, mode, ownership,
//! device numbers, symlink targets, hard-link topology) into
//! node-creation and node-linking calls against an opened volume. Two
//! mergeable sources feed it: a live directory tree and a line-oriented
//! device-table file. The volume format itself lives behind the
//! [`Volume`] trait; [`MemVolume`] is the bundled backend.

#![forbid(unsafe_code)]

pub mod blockmap;
pub mod devtable;
pub mod error;
pub mod hostfs;
pub mod memvol;
pub mod populate;
pub mod registry;
pub mod resolve;
pub mod synth;
pub mod volume;

pub use blockmap::export_block_map;
pub use devtable::{apply_table, DeviceTableDirective};
pub use error::VolError;
pub use hostfs::{HostSource, StdHost};
pub use memvol::MemVolume;
pub use populate::{populate_tree, run_population, PolicyContext};
pub use registry::HardlinkRegistry;
pub use resolve::InsertSpec;
pub use synth::{synthesize, PendingEntry};
pub use volume::{NodeId, NodeKind, NodeMeta, Owner, Volume};
