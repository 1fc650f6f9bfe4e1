//! Directory entries.

use super::header::{read_u16, read_u32, read_u64};

/// Size of one directory entry on disk.
pub const ENTRY_LEN: usize = 128;
/// Entry id meaning "no entry".
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Unused slot.
    Empty,
    /// Storage (a folder of streams and storages).
    Storage,
    /// Stream of bytes.
    Stream,
    /// Root storage, owner of the mini stream.
    Root,
}

impl EntryKind {
    const fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Storage,
            2 => Self::Stream,
            5 => Self::Root,
            _ => Self::Empty,
        }
    }

    #[cfg(any(test, feature = "test-util"))]
    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Self::Empty => 0,
            Self::Storage => 1,
            Self::Stream => 2,
            Self::Root => 5,
        }
    }
}

/// A single entry of the compound document directory.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name.
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Stream size in bytes (mini stream size for the root).
    pub size: u64,
    pub(crate) left: u32,
    pub(crate) right: u32,
    pub(crate) child: u32,
    pub(crate) start_sector: u32,
}

impl DirEntry {
    /// Decodes an entry from its 128-byte record.
    pub(crate) fn parse(raw: &[u8], major_version: u16) -> Self {
        let name_len = usize::from(read_u16(raw, 64)).min(64);
        let units: Vec<u16> = raw[..name_len]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        let name = String::from_utf16_lossy(&units);

        let mut size = read_u64(raw, 120);
        if major_version == 3 {
            // Version 3 files only define the low 32 bits
            size &= 0xFFFF_FFFF;
        }

        Self {
            name,
            kind: EntryKind::from_byte(raw[66]),
            size,
            left: read_u32(raw, 68),
            right: read_u32(raw, 72),
            child: read_u32(raw, 76),
            start_sector: read_u32(raw, 116),
        }
    }

    /// Returns true for stream entries.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.kind == EntryKind::Stream
    }

    /// Returns true for storage and root entries.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self.kind, EntryKind::Storage | EntryKind::Root)
    }
}
