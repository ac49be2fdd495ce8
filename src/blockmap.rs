// CLASSIFICATION: COMMUNITY
// Filename: blockmap.rs v0.2
// Author: Lukas Bower
// Date Modified: 2027-04-27

//! Block-map export.
//!
//! Serializes a node's byte size and allocated block numbers to a side
//! file, `<decimal size>:<space-separated blocks>\n`, named after the
//! volume path with slashes flattened to underscores plus a `.blk`
//! suffix. Read-only; a failed export is fatal but rolls nothing back.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::VolError;
use crate::volume::Volume;

/// Export the block map of `vpath` into `out_dir`, returning the file
/// written.
pub fn export_block_map<V>(vol: &V, vpath: &str, out_dir: &Path) -> Result<PathBuf, VolError>
where
    V: Volume + ?Sized,
{
    let node = vol
        .resolve(vol.root(), vpath)
        .ok_or_else(|| VolError::PathNotFound(vpath.to_string()))?;
    let size = vol.size(node)?;
    let blocks = vol.blocks(node)?;

    let fname = format!("{}.blk", vpath.replace('/', "_"));
    let out_path = out_dir.join(fname);
    let mut out = File::create(&out_path).map_err(|e| VolError::host_io(&out_path, e))?;
    write!(out, "{size}:").map_err(|e| VolError::host_io(&out_path, e))?;
    for blk in blocks {
        write!(out, " {blk}").map_err(|e| VolError::host_io(&out_path, e))?;
    }
    writeln!(out).map_err(|e| VolError::host_io(&out_path, e))?;
    Ok(out_path)
}
