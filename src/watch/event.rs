// src/watch/event.rs

use std::fmt;
use std::path::PathBuf;

use bitflags::bitflags;
use notify::EventKind;
use notify::event::ModifyKind;

bitflags! {
    /// Filesystem operations carried by an [`Event`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Op: u32 {
        const CREATE = 1;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD = 1 << 4;
    }
}

impl Op {
    /// Parse one lowercase operation name as used in project files.
    pub fn parse_name(name: &str) -> Option<Op> {
        match name.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Op::CREATE),
            "write" => Some(Op::WRITE),
            "remove" => Some(Op::REMOVE),
            "rename" => Some(Op::RENAME),
            "chmod" => Some(Op::CHMOD),
            _ => None,
        }
    }

    /// Map a notify event kind. Access and other non-mutating kinds map to
    /// the empty set.
    pub fn from_kind(kind: &EventKind) -> Op {
        match kind {
            EventKind::Create(_) => Op::CREATE,
            EventKind::Modify(ModifyKind::Name(_)) => Op::RENAME,
            EventKind::Modify(ModifyKind::Metadata(_)) => Op::CHMOD,
            EventKind::Modify(_) => Op::WRITE,
            EventKind::Remove(_) => Op::REMOVE,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Op::empty(),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<String> = self
            .iter_names()
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Combine operations into a skip mask.
pub fn skip_op<I: IntoIterator<Item = Op>>(ops: I) -> Op {
    ops.into_iter().fold(Op::empty(), |acc, op| acc | op)
}

/// One filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub path: PathBuf,
    pub op: Op,
}

impl Event {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Split a notify event into one [`Event`] per path. Kinds that do
    /// not map to an operation produce nothing.
    pub fn from_notify(event: notify::Event) -> Vec<Event> {
        let op = Op::from_kind(&event.kind);
        if op.is_empty() {
            return Vec::new();
        }
        event.paths.into_iter().map(|path| Event { path, op }).collect()
    }

    pub fn is_create(&self) -> bool {
        self.op.contains(Op::CREATE)
    }

    pub fn is_write(&self) -> bool {
        self.op.contains(Op::WRITE)
    }

    pub fn is_remove(&self) -> bool {
        self.op.contains(Op::REMOVE)
    }

    pub fn is_rename(&self) -> bool {
        self.op.contains(Op::RENAME)
    }

    pub fn is_chmod(&self) -> bool {
        self.op.contains(Op::CHMOD)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.op, self.path)
    }
}
