// CLASSIFICATION: COMMUNITY
// Filename: hostfs.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-05-14

//! Host filesystem boundary.
//!
//! The tree populator reads the host through [`HostSource`] so that
//! traversal logic can be exercised against synthetic trees (device
//! nodes in particular cannot be created in unprivileged tests).
//! [`StdHost`] is the production implementation over `std::fs` with
//! `lstat` semantics.

use std::fs;
use std::io::Read;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use log::warn;

use crate::error::VolError;
use crate::volume::{NodeKind, PERM_MASK};

/// Host entry classification, `lstat`-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix socket.
    Socket,
    /// Symbolic link.
    Symlink,
    /// Anything else; skipped by the populator.
    Other,
}

impl HostKind {
    /// Volume node kind for this host kind, if one exists.
    pub fn node_kind(self) -> Option<NodeKind> {
        match self {
            HostKind::Regular => Some(NodeKind::Regular),
            HostKind::Directory => Some(NodeKind::Directory),
            HostKind::CharDevice => Some(NodeKind::CharDevice),
            HostKind::BlockDevice => Some(NodeKind::BlockDevice),
            HostKind::Fifo => Some(NodeKind::Fifo),
            HostKind::Socket => Some(NodeKind::Socket),
            HostKind::Symlink => Some(NodeKind::Symlink),
            HostKind::Other => None,
        }
    }
}

/// Host metadata as read without following symlinks.
#[derive(Debug, Clone, Copy)]
pub struct HostMeta {
    /// Entry classification.
    pub kind: HostKind,
    /// Permission and special bits.
    pub perms: u16,
    /// Owner uid.
    pub uid: u32,
    /// Owner gid.
    pub gid: u32,
    /// Content length in bytes.
    pub size: u64,
    /// Hard link count.
    pub nlink: u64,
    /// Source identity used for hard-link folding.
    pub ino: u64,
    /// Device major number, devices only.
    pub major: u8,
    /// Device minor number, devices only.
    pub minor: u8,
    /// Creation (status change) time.
    pub ctime: u32,
    /// Modification time.
    pub mtime: u32,
}

/// One named directory entry.
#[derive(Debug, Clone)]
pub struct HostEntry {
    /// Entry name, final path component only.
    pub name: String,
    /// Its metadata.
    pub meta: HostMeta,
}

/// Read access to the host tree being grafted.
pub trait HostSource {
    /// Entries of a directory, without "." and "..". Order is irrelevant.
    fn list_dir(&self, path: &Path) -> Result<Vec<HostEntry>, VolError>;

    /// Target bytes of a symlink.
    fn read_link(&self, path: &Path) -> Result<Vec<u8>, VolError>;

    /// Open a regular file for content streaming.
    fn open(&self, path: &Path) -> Result<Box<dyn Read>, VolError>;

    /// Metadata following symlinks; used to classify insertion sources.
    fn metadata(&self, path: &Path) -> Result<HostMeta, VolError>;
}

/// Production host reader over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdHost;

impl StdHost {
    fn convert(meta: &fs::Metadata) -> HostMeta {
        let ft = meta.file_type();
        let kind = if ft.is_symlink() {
            HostKind::Symlink
        } else if ft.is_dir() {
            HostKind::Directory
        } else if ft.is_file() {
            HostKind::Regular
        } else if ft.is_char_device() {
            HostKind::CharDevice
        } else if ft.is_block_device() {
            HostKind::BlockDevice
        } else if ft.is_fifo() {
            HostKind::Fifo
        } else if ft.is_socket() {
            HostKind::Socket
        } else {
            HostKind::Other
        };
        let (major, minor) = split_dev(meta.rdev());
        HostMeta {
            kind,
            perms: (meta.mode() as u16) & PERM_MASK,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len(),
            nlink: meta.nlink(),
            ino: meta.ino(),
            major,
            minor,
            ctime: clamp_time(meta.ctime()),
            mtime: clamp_time(meta.mtime()),
        }
    }
}

impl HostSource for StdHost {
    fn list_dir(&self, path: &Path) -> Result<Vec<HostEntry>, VolError> {
        let mut out = Vec::new();
        let iter = fs::read_dir(path).map_err(|e| VolError::host_io(path, e))?;
        for dent in iter {
            let dent = dent.map_err(|e| VolError::host_io(path, e))?;
            let name = match dent.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!("ignoring entry with non-utf8 name {:?}", raw);
                    continue;
                }
            };
            let meta = fs::symlink_metadata(dent.path())
                .map_err(|e| VolError::host_io(dent.path(), e))?;
            out.push(HostEntry {
                name,
                meta: Self::convert(&meta),
            });
        }
        Ok(out)
    }

    fn read_link(&self, path: &Path) -> Result<Vec<u8>, VolError> {
        use std::os::unix::ffi::OsStrExt;
        let target = fs::read_link(path).map_err(|e| VolError::host_io(path, e))?;
        Ok(target.as_os_str().as_bytes().to_vec())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read>, VolError> {
        let file = fs::File::open(path).map_err(|e| VolError::host_io(path, e))?;
        Ok(Box::new(file))
    }

    fn metadata(&self, path: &Path) -> Result<HostMeta, VolError> {
        let meta = fs::metadata(path).map_err(|e| VolError::host_io(path, e))?;
        Ok(Self::convert(&meta))
    }
}

/// Split a Linux `dev_t` into major and minor, truncated to the volume's
/// 8-bit device-number width.
fn split_dev(rdev: u64) -> (u8, u8) {
    let major = ((rdev >> 8) & 0xfff) | ((rdev >> 32) & !0xfff);
    let minor = (rdev & 0xff) | ((rdev >> 12) & !0xff);
    (major as u8, minor as u8)
}

/// Clamp signed epoch seconds into the volume's u32 timestamp width.
pub fn clamp_time(secs: i64) -> u32 {
    secs.clamp(0, u32::MAX as i64) as u32
}
