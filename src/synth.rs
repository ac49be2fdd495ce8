// CLASSIFICATION: COMMUNITY
// Filename: synth.rs v0.6
// Author: Lukas Bower
// Date Modified: 2027-05-02

//! Node synthesizer.
//!
//! Single choke point between the populators and the volume backend:
//! every tree entry and device-table directive becomes a
//! [`PendingEntry`] and lands here. Decides create versus metadata
//! fixup, applies the fast-symlink policy, streams regular-file
//! content, and absorbs directory-space exhaustion with an
//! expand-and-retry loop.

use std::io::Read;

use log::debug;

use crate::error::VolError;
use crate::volume::{NodeId, NodeInit, NodeKind, NodeMeta, Owner, Volume, PERM_MASK};

/// Transient description of one node to create, consumed immediately.
pub struct PendingEntry<'a> {
    /// Entry name; never "." or "..".
    pub name: &'a str,
    /// Node type to synthesize.
    pub kind: NodeKind,
    /// Permission and special bits.
    pub perms: u16,
    /// Ownership after policy application.
    pub owner: Owner,
    /// Device major; zero for non-devices.
    pub major: u8,
    /// Device minor; zero for non-devices.
    pub minor: u8,
    /// Creation time.
    pub ctime: u32,
    /// Modification time.
    pub mtime: u32,
    /// Symlink target bytes; present iff kind is Symlink.
    pub link_target: Option<&'a [u8]>,
    /// Content stream positioned at offset 0; regular files only.
    pub content: Option<&'a mut dyn Read>,
}

/// Retry a directory mutation, expanding the directory whenever the
/// backend reports it full.
fn with_dir_retry<V, T>(
    vol: &mut V,
    dir: NodeId,
    mut op: impl FnMut(&mut V) -> Result<T, VolError>,
) -> Result<T, VolError>
where
    V: Volume + ?Sized,
{
    loop {
        match op(vol) {
            Err(VolError::DirFull) => vol.expand_dir(dir)?,
            other => return other,
        }
    }
}

/// Add a directory entry for an already-materialized node.
pub fn link_into<V>(vol: &mut V, parent: NodeId, name: &str, target: NodeId) -> Result<(), VolError>
where
    V: Volume + ?Sized,
{
    with_dir_retry(vol, parent, |v| v.link(parent, name, target))
}

/// Materialize one pending entry under `parent`.
///
/// An existing node of the same type is a metadata fixup: mode, owner
/// and timestamps are overwritten, content and link target untouched.
/// An existing node of a different type aborts the run.
pub fn synthesize<V>(vol: &mut V, parent: NodeId, entry: PendingEntry<'_>) -> Result<NodeId, VolError>
where
    V: Volume + ?Sized,
{
    if entry.name.is_empty() || entry.name == "." || entry.name == ".." {
        return Err(VolError::BadName(entry.name.to_string()));
    }

    if let Some(existing) = vol.lookup(parent, entry.name) {
        let meta = vol.read_metadata(existing)?;
        if meta.kind != entry.kind {
            return Err(VolError::TypeMismatch(entry.name.to_string()));
        }
        vol.write_metadata(
            existing,
            NodeMeta {
                kind: meta.kind,
                perms: entry.perms & PERM_MASK,
                owner: entry.owner,
                ctime: entry.ctime,
                mtime: entry.mtime,
            },
        )?;
        debug!("fixup {} (node {})", entry.name, existing.0);
        return Ok(existing);
    }

    let node = match entry.kind {
        NodeKind::Symlink => {
            let target = entry.link_target.unwrap_or_default();
            make_symlink(vol, parent, &entry, target)?
        }
        _ => {
            let node = create(vol, parent, &entry, None)?;
            if entry.kind == NodeKind::Regular {
                if let Some(content) = entry.content {
                    stream_content(vol, node, entry.name, content)?;
                }
            }
            node
        }
    };
    debug!("created {} as node {}", entry.name, node.0);
    Ok(node)
}

fn create<V>(
    vol: &mut V,
    parent: NodeId,
    entry: &PendingEntry<'_>,
    inline: Option<&[u8]>,
) -> Result<NodeId, VolError>
where
    V: Volume + ?Sized,
{
    let init = NodeInit {
        name: entry.name,
        kind: entry.kind,
        perms: entry.perms & PERM_MASK,
        owner: entry.owner,
        major: entry.major,
        minor: entry.minor,
        inline,
        ctime: entry.ctime,
        mtime: entry.mtime,
    };
    with_dir_retry(vol, parent, |v| v.create_node(parent, &init))
}

/// Fast-symlink policy: targets shorter than the backend's inline
/// capacity are embedded in the node; longer targets get a content
/// write. The reported size must equal the target length either way.
fn make_symlink<V>(
    vol: &mut V,
    parent: NodeId,
    entry: &PendingEntry<'_>,
    target: &[u8],
) -> Result<NodeId, VolError>
where
    V: Volume + ?Sized,
{
    if target.len() < vol.symlink_capacity() {
        return create(vol, parent, entry, Some(target));
    }
    let node = create(vol, parent, entry, None)?;
    vol.write_at(node, 0, target)?;
    vol.flush(node)?;
    let written = vol.size(node)?;
    if written != target.len() as u64 {
        return Err(VolError::ShortSymlink {
            name: entry.name.to_string(),
            written,
            expected: target.len() as u64,
        });
    }
    Ok(node)
}

fn stream_content<V>(
    vol: &mut V,
    node: NodeId,
    name: &str,
    content: &mut dyn Read,
) -> Result<(), VolError>
where
    V: Volume + ?Sized,
{
    let mut buf = [0u8; 8192];
    let mut offset = 0u64;
    loop {
        let n = content
            .read(&mut buf)
            .map_err(|e| VolError::host_io(name, e))?;
        if n == 0 {
            break;
        }
        vol.write_at(node, offset, &buf[..n])?;
        offset += n as u64;
    }
    vol.flush(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memvol::MemVolume;

    fn entry<'a>(name: &'a str, kind: NodeKind) -> PendingEntry<'a> {
        PendingEntry {
            name,
            kind,
            perms: 0o644,
            owner: Owner::ROOT,
            major: 0,
            minor: 0,
            ctime: 100,
            mtime: 200,
            link_target: None,
            content: None,
        }
    }

    #[test]
    fn rejects_dot_names() {
        let mut vol = MemVolume::create();
        let root = vol.root();
        assert!(matches!(
            synthesize(&mut vol, root, entry(".", NodeKind::Directory)),
            Err(VolError::BadName(_))
        ));
        assert!(matches!(
            synthesize(&mut vol, root, entry("..", NodeKind::Directory)),
            Err(VolError::BadName(_))
        ));
    }

    #[test]
    fn fixup_updates_metadata_not_content() {
        let mut vol = MemVolume::create();
        let root = vol.root();
        let mut data: &[u8] = b"payload";
        let mut e = entry("f", NodeKind::Regular);
        e.content = Some(&mut data);
        let node = synthesize(&mut vol, root, e).unwrap();
        assert_eq!(vol.read_content(node).unwrap(), b"payload");

        let mut again = entry("f", NodeKind::Regular);
        again.perms = 0o600;
        again.owner = Owner { uid: 5, gid: 6 };
        again.mtime = 999;
        let mut other: &[u8] = b"different";
        again.content = Some(&mut other);
        let fixed = synthesize(&mut vol, root, again).unwrap();
        assert_eq!(fixed, node);

        let meta = vol.read_metadata(node).unwrap();
        assert_eq!(meta.perms, 0o600);
        assert_eq!(meta.owner, Owner { uid: 5, gid: 6 });
        assert_eq!(meta.mtime, 999);
        // Content stays whatever the first pass wrote.
        assert_eq!(vol.read_content(node).unwrap(), b"payload");
    }

    #[test]
    fn type_mismatch_is_fatal() {
        let mut vol = MemVolume::create();
        let root = vol.root();
        synthesize(&mut vol, root, entry("x", NodeKind::Regular)).unwrap();
        assert!(matches!(
            synthesize(&mut vol, root, entry("x", NodeKind::Fifo)),
            Err(VolError::TypeMismatch(_))
        ));
    }

    #[test]
    fn symlink_size_matches_target_on_both_paths() {
        let mut vol = MemVolume::create();
        let root = vol.root();

        let short = b"short/target";
        let mut e = entry("s", NodeKind::Symlink);
        e.link_target = Some(short);
        let s = synthesize(&mut vol, root, e).unwrap();
        assert_eq!(vol.size(s).unwrap(), short.len() as u64);
        assert!(vol.blocks(s).unwrap().is_empty());

        let long: Vec<u8> = std::iter::repeat(b'a').take(300).collect();
        let mut e = entry("l", NodeKind::Symlink);
        e.link_target = Some(&long);
        let l = synthesize(&mut vol, root, e).unwrap();
        assert_eq!(vol.size(l).unwrap(), 300);
        assert!(!vol.blocks(l).unwrap().is_empty());
        assert_eq!(vol.read_content(l).unwrap(), long);
    }

    /// Volume wrapper that reports a full directory once per mutation
    /// to exercise the expand-and-retry loop.
    struct FullOnce {
        inner: MemVolume,
        fail_next: bool,
        expands: usize,
    }

    impl FullOnce {
        fn new() -> Self {
            FullOnce {
                inner: MemVolume::create(),
                fail_next: true,
                expands: 0,
            }
        }
    }

    impl Volume for FullOnce {
        fn root(&self) -> NodeId {
            self.inner.root()
        }
        fn resolve(&self, base: NodeId, path: &str) -> Option<NodeId> {
            self.inner.resolve(base, path)
        }
        fn lookup(&self, parent: NodeId, name: &str) -> Option<NodeId> {
            self.inner.lookup(parent, name)
        }
        fn create_node(&mut self, parent: NodeId, init: &NodeInit<'_>) -> Result<NodeId, VolError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(VolError::DirFull);
            }
            self.inner.create_node(parent, init)
        }
        fn link(&mut self, parent: NodeId, name: &str, target: NodeId) -> Result<(), VolError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(VolError::DirFull);
            }
            self.inner.link(parent, name, target)
        }
        fn read_metadata(&self, node: NodeId) -> Result<NodeMeta, VolError> {
            self.inner.read_metadata(node)
        }
        fn write_metadata(&mut self, node: NodeId, meta: NodeMeta) -> Result<(), VolError> {
            self.inner.write_metadata(node, meta)
        }
        fn write_at(&mut self, node: NodeId, offset: u64, data: &[u8]) -> Result<(), VolError> {
            self.inner.write_at(node, offset, data)
        }
        fn flush(&mut self, node: NodeId) -> Result<(), VolError> {
            self.inner.flush(node)
        }
        fn expand_dir(&mut self, dir: NodeId) -> Result<(), VolError> {
            self.expands += 1;
            self.inner.expand_dir(dir)
        }
        fn blocks(&self, node: NodeId) -> Result<Vec<u64>, VolError> {
            self.inner.blocks(node)
        }
        fn size(&self, node: NodeId) -> Result<u64, VolError> {
            self.inner.size(node)
        }
        fn symlink_capacity(&self) -> usize {
            self.inner.symlink_capacity()
        }
    }

    #[test]
    fn dir_full_triggers_expand_and_retry() {
        let mut vol = FullOnce::new();
        let root = vol.root();
        let node = synthesize(&mut vol, root, entry("f", NodeKind::Regular)).unwrap();
        assert_eq!(vol.expands, 1);
        assert_eq!(vol.lookup(root, "f"), Some(node));

        vol.fail_next = true;
        link_into(&mut vol, root, "g", node).unwrap();
        assert_eq!(vol.expands, 2);
        assert_eq!(vol.lookup(root, "g"), Some(node));
    }
}
