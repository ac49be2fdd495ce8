// CLASSIFICATION: COMMUNITY
// Filename: memvol.rs v0.7
// Author: Lukas Bower
// Date Modified: 2027-05-14

//! Bundled in-memory volume backend.
//!
//! Keeps the whole volume as an inode table plus a block store and
//! snapshots itself to the image file as JSON. Geometry is deliberately
//! small: 1 KiB blocks and a 60-byte inline area per node, the classic
//! fifteen-pointer layout. Real on-disk formats live behind other
//! [`Volume`] implementations.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VolError;
use crate::volume::{NodeId, NodeInit, NodeKind, NodeMeta, Owner, Volume, PERM_MASK};

/// Content block size in bytes.
pub const BLOCK_SIZE: u64 = 1024;

/// Inline payload capacity per node: 15 pointers of 4 bytes.
const INLINE_CAPACITY: usize = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Inode {
    kind: NodeKind,
    perms: u16,
    uid: u32,
    gid: u32,
    ctime: u32,
    mtime: u32,
    links: u32,
    size: u64,
    major: u8,
    minor: u8,
    /// Payload embedded in the node; used for fast symlinks.
    inline: Option<Vec<u8>>,
    /// Allocated data blocks in file order.
    blocks: Vec<u64>,
    /// Directory entries, name to inode index. Empty for non-dirs.
    children: BTreeMap<String, u32>,
    /// Parent inode index; the root points at itself.
    parent: u32,
}

impl Inode {
    fn new(kind: NodeKind, parent: u32) -> Self {
        Inode {
            kind,
            perms: 0,
            uid: 0,
            gid: 0,
            ctime: 0,
            mtime: 0,
            links: if kind == NodeKind::Directory { 2 } else { 1 },
            size: 0,
            major: 0,
            minor: 0,
            inline: None,
            blocks: Vec::new(),
            children: BTreeMap::new(),
            parent,
        }
    }
}

/// In-memory volume with JSON image persistence.
#[derive(Debug, Serialize, Deserialize)]
pub struct MemVolume {
    inodes: Vec<Inode>,
    /// Block store, block number to content.
    data: BTreeMap<u64, Vec<u8>>,
    next_block: u64,
}

impl MemVolume {
    /// Create an empty volume holding only a root directory.
    pub fn create() -> Self {
        let mut root = Inode::new(NodeKind::Directory, 0);
        root.perms = 0o755;
        MemVolume {
            inodes: vec![root],
            data: BTreeMap::new(),
            next_block: 1,
        }
    }

    /// Load a volume from an image file.
    pub fn open(path: &Path) -> Result<Self, VolError> {
        let file = File::open(path).map_err(|e| VolError::Image {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let vol: MemVolume =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| VolError::Image {
                path: path.to_path_buf(),
                reason: format!("parse failed: {e}"),
            })?;
        if vol.inodes.is_empty() || vol.inodes[0].kind != NodeKind::Directory {
            return Err(VolError::Image {
                path: path.to_path_buf(),
                reason: "missing root directory".into(),
            });
        }
        Ok(vol)
    }

    /// Write the volume back to an image file.
    pub fn save(&self, path: &Path) -> Result<(), VolError> {
        let file = File::create(path).map_err(|e| VolError::Image {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|e| VolError::Image {
            path: path.to_path_buf(),
            reason: format!("write failed: {e}"),
        })
    }

    /// Directory-entry count pointing at a node.
    pub fn link_count(&self, node: NodeId) -> u32 {
        self.inodes
            .get(node.0 as usize)
            .map(|n| n.links)
            .unwrap_or(0)
    }

    /// Device major/minor of a node.
    pub fn device_numbers(&self, node: NodeId) -> Option<(u8, u8)> {
        self.inodes.get(node.0 as usize).map(|n| (n.major, n.minor))
    }

    /// Full content bytes of a node, inline or block-backed.
    pub fn read_content(&self, node: NodeId) -> Result<Vec<u8>, VolError> {
        let ino = self.node(node)?;
        if let Some(inline) = &ino.inline {
            return Ok(inline.clone());
        }
        let mut out = Vec::with_capacity(ino.size as usize);
        for blk in &ino.blocks {
            let chunk = self.data.get(blk).ok_or(VolError::BadNode(node.0))?;
            out.extend_from_slice(chunk);
        }
        out.truncate(ino.size as usize);
        Ok(out)
    }

    /// Names of a directory's entries.
    pub fn dir_entries(&self, dir: NodeId) -> Result<Vec<String>, VolError> {
        let ino = self.node(dir)?;
        if ino.kind != NodeKind::Directory {
            return Err(VolError::NotADirectory(format!("{}", dir.0)));
        }
        Ok(ino.children.keys().cloned().collect())
    }

    fn node(&self, id: NodeId) -> Result<&Inode, VolError> {
        self.inodes.get(id.0 as usize).ok_or(VolError::BadNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Inode, VolError> {
        self.inodes
            .get_mut(id.0 as usize)
            .ok_or(VolError::BadNode(id.0))
    }

    fn check_name(name: &str) -> Result<(), VolError> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(VolError::BadName(name.to_string()));
        }
        Ok(())
    }
}

impl Volume for MemVolume {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn resolve(&self, base: NodeId, path: &str) -> Option<NodeId> {
        let mut cur = if path.starts_with('/') {
            self.root()
        } else {
            base
        };
        for comp in path.split('/') {
            match comp {
                "" | "." => continue,
                ".." => {
                    cur = NodeId(self.inodes.get(cur.0 as usize)?.parent);
                }
                name => {
                    let ino = self.inodes.get(cur.0 as usize)?;
                    cur = NodeId(*ino.children.get(name)?);
                }
            }
        }
        Some(cur)
    }

    fn lookup(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let ino = self.inodes.get(parent.0 as usize)?;
        ino.children.get(name).map(|&i| NodeId(i))
    }

    fn create_node(&mut self, parent: NodeId, init: &NodeInit<'_>) -> Result<NodeId, VolError> {
        Self::check_name(init.name)?;
        {
            let dir = self.node(parent)?;
            if dir.kind != NodeKind::Directory {
                return Err(VolError::NotADirectory(init.name.to_string()));
            }
            if let Some(&existing) = dir.children.get(init.name) {
                let kind = self.inodes[existing as usize].kind;
                return Err(if kind == init.kind {
                    VolError::Exists(init.name.to_string())
                } else {
                    VolError::TypeMismatch(init.name.to_string())
                });
            }
        }
        let id = self.inodes.len() as u32;
        let mut ino = Inode::new(init.kind, parent.0);
        ino.perms = init.perms & PERM_MASK;
        ino.uid = init.owner.uid;
        ino.gid = init.owner.gid;
        ino.ctime = init.ctime;
        ino.mtime = init.mtime;
        ino.major = init.major;
        ino.minor = init.minor;
        if let Some(payload) = init.inline {
            if payload.len() > INLINE_CAPACITY {
                return Err(VolError::InlineTooBig {
                    name: init.name.to_string(),
                    len: payload.len(),
                    capacity: INLINE_CAPACITY,
                });
            }
            ino.size = payload.len() as u64;
            ino.inline = Some(payload.to_vec());
        }
        self.inodes.push(ino);
        let dir = self.node_mut(parent)?;
        dir.children.insert(init.name.to_string(), id);
        if init.kind == NodeKind::Directory {
            dir.links += 1;
        }
        Ok(NodeId(id))
    }

    fn link(&mut self, parent: NodeId, name: &str, target: NodeId) -> Result<(), VolError> {
        Self::check_name(name)?;
        if target.0 as usize >= self.inodes.len() {
            return Err(VolError::BadNode(target.0));
        }
        let dir = self.node(parent)?;
        if dir.kind != NodeKind::Directory {
            return Err(VolError::NotADirectory(name.to_string()));
        }
        if dir.children.contains_key(name) {
            return Err(VolError::Exists(name.to_string()));
        }
        self.node_mut(parent)?.children.insert(name.to_string(), target.0);
        self.node_mut(target)?.links += 1;
        Ok(())
    }

    fn read_metadata(&self, node: NodeId) -> Result<NodeMeta, VolError> {
        let ino = self.node(node)?;
        Ok(NodeMeta {
            kind: ino.kind,
            perms: ino.perms,
            owner: Owner {
                uid: ino.uid,
                gid: ino.gid,
            },
            ctime: ino.ctime,
            mtime: ino.mtime,
        })
    }

    fn write_metadata(&mut self, node: NodeId, meta: NodeMeta) -> Result<(), VolError> {
        let ino = self.node_mut(node)?;
        ino.perms = meta.perms & PERM_MASK;
        ino.uid = meta.owner.uid;
        ino.gid = meta.owner.gid;
        ino.ctime = meta.ctime;
        ino.mtime = meta.mtime;
        Ok(())
    }

    fn write_at(&mut self, node: NodeId, offset: u64, data: &[u8]) -> Result<(), VolError> {
        if data.is_empty() {
            return Ok(());
        }
        // Content writes supersede any inline payload.
        let end = offset + data.len() as u64;
        let last_block = (end - 1) / BLOCK_SIZE;
        let ino = self.node(node)?;
        let mut blocks = ino.blocks.clone();
        while (blocks.len() as u64) <= last_block {
            let blk = self.next_block;
            self.next_block += 1;
            self.data.insert(blk, vec![0; BLOCK_SIZE as usize]);
            blocks.push(blk);
        }
        let mut written = 0usize;
        let mut pos = offset;
        while written < data.len() {
            let blk = blocks[(pos / BLOCK_SIZE) as usize];
            let inside = (pos % BLOCK_SIZE) as usize;
            let take = (BLOCK_SIZE as usize - inside).min(data.len() - written);
            let buf = self.data.get_mut(&blk).ok_or(VolError::BadNode(node.0))?;
            buf[inside..inside + take].copy_from_slice(&data[written..written + take]);
            written += take;
            pos += take as u64;
        }
        let ino = self.node_mut(node)?;
        ino.inline = None;
        ino.blocks = blocks;
        if end > ino.size {
            ino.size = end;
        }
        Ok(())
    }

    fn flush(&mut self, node: NodeId) -> Result<(), VolError> {
        self.node(node).map(|_| ())
    }

    fn expand_dir(&mut self, dir: NodeId) -> Result<(), VolError> {
        // Directories here are maps; growth is implicit.
        self.node(dir).map(|_| ())
    }

    fn blocks(&self, node: NodeId) -> Result<Vec<u64>, VolError> {
        Ok(self.node(node)?.blocks.clone())
    }

    fn size(&self, node: NodeId) -> Result<u64, VolError> {
        Ok(self.node(node)?.size)
    }

    fn symlink_capacity(&self) -> usize {
        INLINE_CAPACITY
    }
}
