// CLASSIFICATION: COMMUNITY
// Filename: volume.rs v0.4
// Author: Lukas Bower
// Date Modified: 2027-04-11

//! Volume backend boundary.
//!
//! The population core never touches on-disk layout; it speaks to the
//! backend through [`Volume`]. Superblocks, bitmaps, block allocation
//! and endianness all live behind this trait.

use serde::{Deserialize, Serialize};

use crate::error::VolError;

/// Opaque node identifier within one volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Node type, one bit of ext2-style `i_mode` semantics without the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Character special device.
    CharDevice,
    /// Block special device.
    BlockDevice,
    /// Named pipe.
    Fifo,
    /// Unix socket.
    Socket,
    /// Symbolic link.
    Symlink,
}

/// Permission, suid/sgid and sticky bits; everything below the type bits.
pub const PERM_MASK: u16 = 0o7777;

/// Group and other read/write/execute bits, cleared by perm squashing.
pub const PERM_GROUP_OTHER: u16 = 0o077;

/// Node ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

impl Owner {
    /// Root ownership, the squash target.
    pub const ROOT: Owner = Owner { uid: 0, gid: 0 };
}

/// Mutable metadata of an existing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMeta {
    /// Node type. Read-only; `write_metadata` must not change it.
    pub kind: NodeKind,
    /// Permission bits, masked to [`PERM_MASK`].
    pub perms: u16,
    /// Ownership.
    pub owner: Owner,
    /// Creation time, seconds since the epoch.
    pub ctime: u32,
    /// Modification time, seconds since the epoch.
    pub mtime: u32,
}

/// Everything the backend needs to materialize one new node.
#[derive(Debug)]
pub struct NodeInit<'a> {
    /// Entry name within the parent directory.
    pub name: &'a str,
    /// Node type.
    pub kind: NodeKind,
    /// Permission bits.
    pub perms: u16,
    /// Ownership.
    pub owner: Owner,
    /// Device major number; zero for non-devices.
    pub major: u8,
    /// Device minor number; zero for non-devices.
    pub minor: u8,
    /// Inline payload stored in the node itself (fast symlinks).
    pub inline: Option<&'a [u8]>,
    /// Creation time.
    pub ctime: u32,
    /// Modification time.
    pub mtime: u32,
}

/// Backend contract consumed by the population core.
///
/// `create_node` and `link` may fail with [`VolError::DirFull`]; callers
/// are expected to [`Volume::expand_dir`] and retry. Every other error is
/// final.
pub trait Volume {
    /// Root directory of the volume.
    fn root(&self) -> NodeId;

    /// Resolve a slash-separated path against `base`. Absolute paths
    /// resolve from the volume root. Returns `None` when any component
    /// is missing.
    fn resolve(&self, base: NodeId, path: &str) -> Option<NodeId>;

    /// Look up one entry name in a directory.
    fn lookup(&self, parent: NodeId, name: &str) -> Option<NodeId>;

    /// Create a node under `parent`. Fails with [`VolError::Exists`] or
    /// [`VolError::TypeMismatch`] when the name is already taken.
    fn create_node(&mut self, parent: NodeId, init: &NodeInit<'_>) -> Result<NodeId, VolError>;

    /// Add a directory entry for an existing node (hard link).
    fn link(&mut self, parent: NodeId, name: &str, target: NodeId) -> Result<(), VolError>;

    /// Read a node's mutable metadata.
    fn read_metadata(&self, node: NodeId) -> Result<NodeMeta, VolError>;

    /// Overwrite a node's mutable metadata. The kind field is ignored.
    fn write_metadata(&mut self, node: NodeId, meta: NodeMeta) -> Result<(), VolError>;

    /// Write content bytes at an absolute offset, growing the node.
    fn write_at(&mut self, node: NodeId, offset: u64, data: &[u8]) -> Result<(), VolError>;

    /// Flush buffered content for a node.
    fn flush(&mut self, node: NodeId) -> Result<(), VolError>;

    /// Grow a directory that reported [`VolError::DirFull`].
    fn expand_dir(&mut self, dir: NodeId) -> Result<(), VolError>;

    /// Allocated data block numbers of a node, in file order.
    fn blocks(&self, node: NodeId) -> Result<Vec<u64>, VolError>;

    /// Byte size of a node's content.
    fn size(&self, node: NodeId) -> Result<u64, VolError>;

    /// Bytes a node can embed inline; symlink targets shorter than this
    /// are stored without a data block. Backend geometry, not policy.
    fn symlink_capacity(&self) -> usize;
}
