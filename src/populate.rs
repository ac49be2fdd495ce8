// CLASSIFICATION: COMMUNITY
// Filename: populate.rs v0.8
// Author: Lukas Bower
// Date Modified: 2027-05-14

//! Tree populator and run driver.
//!
//! Walks a host directory depth-first and grafts it onto a volume
//! directory. The walk threads explicit host paths through recursion
//! instead of mutating the process working directory, so sibling
//! traversal stays correct on every error path.

use std::path::Path;

use log::warn;

use crate::devtable::apply_table;
use crate::error::VolError;
use crate::hostfs::{HostKind, HostMeta, HostSource};
use crate::registry::HardlinkRegistry;
use crate::resolve::InsertSpec;
use crate::synth::{link_into, synthesize, PendingEntry};
use crate::volume::{NodeId, NodeKind, Owner, Volume, PERM_GROUP_OTHER};

/// Global overrides applied to every entry of one population run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyContext {
    /// Force ownership of all synthesized nodes to root.
    pub squash_uids: bool,
    /// Clear group and other permission bits on all synthesized nodes.
    pub squash_perms: bool,
    /// Fixed creation time overriding host metadata, when set.
    pub synthetic_ctime: Option<u32>,
}

impl PolicyContext {
    fn owner(&self, meta: &HostMeta) -> Owner {
        if self.squash_uids {
            Owner::ROOT
        } else {
            Owner {
                uid: meta.uid,
                gid: meta.gid,
            }
        }
    }

    fn perms(&self, meta: &HostMeta) -> u16 {
        if self.squash_perms {
            meta.perms & !PERM_GROUP_OTHER
        } else {
            meta.perms
        }
    }

    fn ctime(&self, host_ctime: u32) -> u32 {
        self.synthetic_ctime.unwrap_or(host_ctime)
    }
}

/// Populate the volume directory `at` from the host directory `dir`.
///
/// Hard-link folding: the first name seen for a multiply-linked host
/// inode creates the node and records it; later names become links, or
/// are left alone when a rerun finds them already pointing at the
/// folded node. Directories and symlinks never participate.
pub fn populate_tree<V, H>(
    vol: &mut V,
    host: &H,
    registry: &mut HardlinkRegistry,
    dir: &Path,
    at: NodeId,
    policy: &PolicyContext,
) -> Result<(), VolError>
where
    V: Volume + ?Sized,
    H: HostSource + ?Sized,
{
    for entry in host.list_dir(dir)? {
        let meta = entry.meta;
        let path = dir.join(&entry.name);

        let kind = match meta.kind.node_kind() {
            Some(kind) => kind,
            None => {
                warn!("ignoring entry {}", path.display());
                continue;
            }
        };

        let hardlink_candidate =
            kind != NodeKind::Directory && kind != NodeKind::Symlink && meta.nlink > 1;
        if hardlink_candidate {
            if let Some(existing) = registry.lookup(meta.ino) {
                match vol.lookup(at, &entry.name) {
                    // Rerun over a populated volume: the name already
                    // points at the folded node, nothing left to do.
                    Some(present) if present == existing => {}
                    Some(_) => return Err(VolError::Exists(entry.name.clone())),
                    None => link_into(vol, at, &entry.name, existing)?,
                }
                continue;
            }
        }

        let mut pending = PendingEntry {
            name: &entry.name,
            kind,
            perms: policy.perms(&meta),
            owner: policy.owner(&meta),
            major: 0,
            minor: 0,
            ctime: policy.ctime(meta.ctime),
            mtime: meta.mtime,
            link_target: None,
            content: None,
        };

        let node = match kind {
            NodeKind::CharDevice | NodeKind::BlockDevice => {
                pending.major = meta.major;
                pending.minor = meta.minor;
                synthesize(vol, at, pending)?
            }
            NodeKind::Symlink => {
                let target = host.read_link(&path)?;
                pending.link_target = Some(&target);
                synthesize(vol, at, pending)?
            }
            NodeKind::Regular => {
                let mut content = host.open(&path)?;
                pending.content = Some(&mut *content);
                synthesize(vol, at, pending)?
            }
            NodeKind::Directory => {
                let node = synthesize(vol, at, pending)?;
                populate_tree(vol, host, registry, &path, node, policy)?;
                node
            }
            NodeKind::Fifo | NodeKind::Socket => synthesize(vol, at, pending)?,
        };

        if hardlink_candidate {
            registry.record(meta.ino, node);
        }
    }
    Ok(())
}

/// Run a whole population: resolve each insertion point, then graft a
/// host tree or interpret a device table depending on the source kind.
/// One hard-link registry spans all insertion points of the run.
pub fn run_population<V, H>(
    vol: &mut V,
    host: &H,
    specs: &[InsertSpec],
    policy: &PolicyContext,
) -> Result<(), VolError>
where
    V: Volume + ?Sized,
    H: HostSource + ?Sized,
{
    let mut registry = HardlinkRegistry::new();
    for spec in specs {
        let at = spec.resolve_dest(vol)?;
        let meta = host.metadata(&spec.source)?;
        match meta.kind {
            HostKind::Directory => {
                populate_tree(vol, host, &mut registry, &spec.source, at, policy)?
            }
            HostKind::Regular => apply_table(vol, &spec.source, at, policy.synthetic_ctime)?,
            _ => return Err(VolError::BadSource(spec.source.clone())),
        }
    }
    Ok(())
}
