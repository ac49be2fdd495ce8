// CLASSIFICATION: COMMUNITY
// Filename: devtable.rs v0.8
// Author: Lukas Bower
// Date Modified: 2027-05-02

//! Device-table interpreter.
//!
//! Reads the classic line-oriented table format:
//!
//! ```text
//! <path> <type> <mode> <uid> <gid> <major> <minor> <start> <inc> <count>
//! /dev/mem  c  640  0  0  1  1  0  0  -
//! ```
//!
//! Types: d directory, f regular file, p fifo, s socket, c char device,
//! b block device. Path and type are mandatory; the rest default. A bad
//! line is skipped with a diagnostic and never aborts the run; only an
//! unreadable table file is fatal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use log::warn;

use crate::error::VolError;
use crate::hostfs::clamp_time;
use crate::synth::{synthesize, PendingEntry};
use crate::volume::{NodeId, NodeKind, Owner, Volume, PERM_MASK};

/// One parsed, non-comment, non-blank table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTableDirective {
    /// Volume path of the entry, absolute or insertion-relative.
    pub path: String,
    /// Node type from the type character.
    pub kind: NodeKind,
    /// Permission bits, already masked to the 12-bit space.
    pub perms: u16,
    /// Owner uid.
    pub uid: u32,
    /// Owner gid.
    pub gid: u32,
    /// Device major number.
    pub major: u32,
    /// Device minor number (range base when count > 0).
    pub minor: u32,
    /// First index of a numeric range.
    pub start: u32,
    /// Minor-number step per index.
    pub increment: u32,
    /// Range end; zero means no range.
    pub count: u32,
}

/// Outcome of parsing one raw table line.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedLine {
    /// Comment or whitespace only.
    Blank,
    /// A well-formed directive.
    Entry(DeviceTableDirective),
    /// Malformed; skip with this diagnostic.
    Skip(String),
}

fn kind_for(type_char: char) -> Option<NodeKind> {
    match type_char {
        'd' => Some(NodeKind::Directory),
        'f' => Some(NodeKind::Regular),
        'p' => Some(NodeKind::Fifo),
        's' => Some(NodeKind::Socket),
        'c' => Some(NodeKind::CharDevice),
        'b' => Some(NodeKind::BlockDevice),
        _ => None,
    }
}

/// Parse one line after comment stripping. Path, type and mode are
/// required; trailing numeric fields default to 0 (increment to 1) and
/// parsing stops quietly at the first non-numeric trailing field.
pub fn parse_line(line: &str) -> ParsedLine {
    let text = line.split('#').next().unwrap_or("");
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.is_empty() {
        return ParsedLine::Blank;
    }
    if fields.len() < 3 {
        return ParsedLine::Skip(format!("bad format for entry '{}'", fields[0]));
    }
    let path = fields[0].to_string();

    let mut chars = fields[1].chars();
    let type_char = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return ParsedLine::Skip(format!("bad type '{}' for entry '{}'", fields[1], path));
        }
    };
    let kind = match kind_for(type_char) {
        Some(kind) => kind,
        None => {
            return ParsedLine::Skip(format!("bad type '{type_char}' for entry '{path}'"));
        }
    };

    let perms = match u16::from_str_radix(fields[2], 8) {
        Ok(mode) => mode & PERM_MASK,
        Err(_) => return ParsedLine::Skip(format!("bad format for entry '{path}'")),
    };

    // Trailing numeric fields, in table order.
    let mut numbers = [0u32, 0, 0, 0, 0, 1, 0];
    for (slot, field) in numbers.iter_mut().zip(&fields[3..]) {
        match field.parse::<u32>() {
            Ok(value) => *slot = value,
            Err(_) => break,
        }
    }
    let [uid, gid, major, minor, start, increment, count] = numbers;

    ParsedLine::Entry(DeviceTableDirective {
        path,
        kind,
        perms,
        uid,
        gid,
        major,
        minor,
        start,
        increment,
        count,
    })
}

/// Split a table path into parent directory and entry basename.
fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((dir, name)) => (dir, name),
        None => (".", trimmed),
    }
}

/// Interpret a device-table file against the insertion root `at`.
///
/// Entry mtimes come from the table file itself; ctimes from
/// `synthetic_ctime` when set, else the table file. Per-line problems
/// are diagnostics; volume failures propagate as fatal.
pub fn apply_table<V>(
    vol: &mut V,
    table: &Path,
    at: NodeId,
    synthetic_ctime: Option<u32>,
) -> Result<(), VolError>
where
    V: Volume + ?Sized,
{
    let file = File::open(table).map_err(|e| VolError::host_io(table, e))?;
    let meta = file.metadata().map_err(|e| VolError::host_io(table, e))?;
    let mtime = clamp_time(meta.mtime());
    let ctime = synthetic_ctime.unwrap_or_else(|| clamp_time(meta.ctime()));

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let lineno = idx + 1;
        let line = line.map_err(|e| VolError::host_io(table, e))?;
        let directive = match parse_line(&line) {
            ParsedLine::Blank => continue,
            ParsedLine::Skip(reason) => {
                warn!("device table line {lineno} skipped: {reason}");
                continue;
            }
            ParsedLine::Entry(directive) => directive,
        };

        let (dir, name) = split_path(&directive.path);
        if name.is_empty() || name == "." || name == ".." {
            warn!("device table line {lineno} skipped");
            continue;
        }
        let parent = match vol.resolve(at, dir) {
            Some(parent) => parent,
            None => {
                warn!(
                    "device table line {lineno} skipped: can't find directory '{dir}' to create '{name}'"
                );
                continue;
            }
        };

        let owner = Owner {
            uid: directive.uid,
            gid: directive.gid,
        };
        if directive.count > 0 {
            for i in directive.start..directive.count {
                let numbered = format!("{name}{i}");
                let minor = directive
                    .minor
                    .wrapping_add(i.wrapping_mul(directive.increment))
                    .wrapping_sub(directive.start);
                synthesize(
                    vol,
                    parent,
                    PendingEntry {
                        name: &numbered,
                        kind: directive.kind,
                        perms: directive.perms,
                        owner,
                        major: directive.major as u8,
                        minor: minor as u8,
                        ctime,
                        mtime,
                        link_target: None,
                        content: None,
                    },
                )?;
            }
        } else {
            synthesize(
                vol,
                parent,
                PendingEntry {
                    name,
                    kind: directive.kind,
                    perms: directive.perms,
                    owner,
                    major: directive.major as u8,
                    minor: directive.minor as u8,
                    ctime,
                    mtime,
                    link_target: None,
                    content: None,
                },
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memvol::MemVolume;
    use std::io::Write;

    #[test]
    fn blank_and_comment_lines() {
        assert_eq!(parse_line(""), ParsedLine::Blank);
        assert_eq!(parse_line("   \t "), ParsedLine::Blank);
        assert_eq!(parse_line("# all comment"), ParsedLine::Blank);
        assert_eq!(parse_line("   # indented"), ParsedLine::Blank);
    }

    #[test]
    fn short_lines_are_skipped() {
        assert!(matches!(parse_line("/dev/mem"), ParsedLine::Skip(_)));
        assert!(matches!(parse_line("/dev/mem c"), ParsedLine::Skip(_)));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let d = match parse_line("/dev/mem c 640") {
            ParsedLine::Entry(d) => d,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(d.perms, 0o640);
        assert_eq!((d.uid, d.gid, d.major, d.minor), (0, 0, 0, 0));
        assert_eq!((d.start, d.increment, d.count), (0, 1, 0));
    }

    #[test]
    fn full_line_parses() {
        let d = match parse_line("/dev/ttyS c 644 0 5 4 64 0 1 4 # serial") {
            ParsedLine::Entry(d) => d,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(d.kind, NodeKind::CharDevice);
        assert_eq!((d.gid, d.major, d.minor), (5, 4, 64));
        assert_eq!((d.start, d.increment, d.count), (0, 1, 4));
    }

    #[test]
    fn mode_masks_to_permission_space() {
        let d = match parse_line("/x f 107777") {
            ParsedLine::Entry(d) => d,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(d.perms, 0o7777);
    }

    #[test]
    fn unknown_type_is_skipped() {
        assert!(matches!(parse_line("/dev/mem x 640"), ParsedLine::Skip(_)));
        assert!(matches!(parse_line("/dev/mem cc 640"), ParsedLine::Skip(_)));
    }

    #[test]
    fn bad_trailing_field_defaults_quietly() {
        // "-" in a numeric position ends field consumption.
        let d = match parse_line("/dev/mem c 640 0 0 1 1 0 0 -") {
            ParsedLine::Entry(d) => d,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(d.count, 0);
    }

    #[test]
    fn split_path_cases() {
        assert_eq!(split_path("/dev/ttyS"), ("/dev", "ttyS"));
        assert_eq!(split_path("dev/ttyS"), ("dev", "ttyS"));
        assert_eq!(split_path("ttyS"), (".", "ttyS"));
        assert_eq!(split_path("/mem"), ("/", "mem"));
    }

    fn table_file(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("table.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn range_expansion_yields_arithmetic_minors() {
        let tmp = tempfile::tempdir().unwrap();
        let table = table_file(tmp.path(), "/dev d 755\n/dev/ttyS c 644 0 0 4 64 0 1 4\n");
        let mut vol = MemVolume::create();
        let root = vol.root();
        apply_table(&mut vol, &table, root, Some(0)).unwrap();

        for i in 0..4u32 {
            let node = vol
                .resolve(root, &format!("/dev/ttyS{i}"))
                .unwrap_or_else(|| panic!("ttyS{i} missing"));
            assert_eq!(vol.device_numbers(node), Some((4, 64 + i as u8)));
            assert_eq!(vol.read_metadata(node).unwrap().kind, NodeKind::CharDevice);
        }
        assert!(vol.resolve(root, "/dev/ttyS4").is_none());
        assert!(vol.resolve(root, "/dev/ttyS").is_none());
    }

    #[test]
    fn bad_lines_do_not_stop_later_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let table = table_file(
            tmp.path(),
            "bogus\n/dev/null q 666\n/missing/x c 640\n/ok p 600\n",
        );
        let mut vol = MemVolume::create();
        let root = vol.root();
        apply_table(&mut vol, &table, root, None).unwrap();
        let node = vol.resolve(root, "/ok").unwrap();
        assert_eq!(vol.read_metadata(node).unwrap().kind, NodeKind::Fifo);
        assert_eq!(vol.dir_entries(root).unwrap(), vec!["ok".to_string()]);
    }

    #[test]
    fn dot_basenames_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let table = table_file(tmp.path(), "/dev/. d 755\n/dev/.. d 755\n");
        let mut vol = MemVolume::create();
        let root = vol.root();
        apply_table(&mut vol, &table, root, None).unwrap();
        assert!(vol.dir_entries(root).unwrap().is_empty());
    }

    #[test]
    fn relative_paths_resolve_from_insertion_root() {
        let tmp = tempfile::tempdir().unwrap();
        let table = table_file(tmp.path(), "sub d 755\nsub/fifo p 600\n");
        let mut vol = MemVolume::create();
        let root = vol.root();
        let at = vol
            .create_node(
                root,
                &crate::volume::NodeInit {
                    name: "graft",
                    kind: NodeKind::Directory,
                    perms: 0o755,
                    owner: Owner::ROOT,
                    major: 0,
                    minor: 0,
                    inline: None,
                    ctime: 0,
                    mtime: 0,
                },
            )
            .unwrap();
        apply_table(&mut vol, &table, at, None).unwrap();
        assert!(vol.resolve(root, "/graft/sub/fifo").is_some());
    }

    #[test]
    fn missing_table_file_is_fatal() {
        let mut vol = MemVolume::create();
        let root = vol.root();
        let err = apply_table(&mut vol, Path::new("/no/such/table"), root, None);
        assert!(matches!(err, Err(VolError::HostIo { .. })));
    }

    #[test]
    fn synthetic_ctime_overrides_table_file() {
        let tmp = tempfile::tempdir().unwrap();
        let table = table_file(tmp.path(), "/fifo p 600\n");
        let mut vol = MemVolume::create();
        let root = vol.root();
        apply_table(&mut vol, &table, root, Some(0)).unwrap();
        let node = vol.resolve(root, "/fifo").unwrap();
        let meta = vol.read_metadata(node).unwrap();
        assert_eq!(meta.ctime, 0);
        assert!(meta.mtime > 0);
    }
}
