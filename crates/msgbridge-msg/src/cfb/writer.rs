//! Minimal compound document writer for building fixtures.
//!
//! Produces version 3 files (512-byte sectors). Streams below the mini
//! stream cutoff go to the mini stream, larger ones to regular sectors.
//! Siblings are linked as a right-leaning list, which readers walking the
//! tree in order accept.

use super::directory::{ENTRY_LEN, EntryKind, NOSTREAM};
use super::header::{DIFSECT, ENDOFCHAIN, FATSECT, FREESECT, HEADER_DIFAT_ENTRIES, HEADER_LEN};
use crate::validate::SIGNATURE;

const SECTOR: usize = 512;
const MINI_SECTOR: usize = 64;
const MINI_CUTOFF: usize = 4096;
const IDS_PER_SECTOR: usize = SECTOR / 4;

#[derive(Debug)]
struct Node {
    name: String,
    kind: EntryKind,
    children: Vec<usize>,
    data: Vec<u8>,
}

/// Builds an in-memory compound document.
#[derive(Debug)]
pub struct CompoundWriter {
    nodes: Vec<Node>,
}

impl Default for CompoundWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl CompoundWriter {
    /// Creates a writer holding only the root storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: "Root Entry".to_string(),
                kind: EntryKind::Root,
                children: Vec::new(),
                data: Vec::new(),
            }],
        }
    }

    /// Adds a stream at `path`, creating intermediate storages as needed.
    ///
    /// The last path element names the stream.
    pub fn add_stream(&mut self, path: &[&str], data: Vec<u8>) -> &mut Self {
        let Some((stream, storages)) = path.split_last() else {
            return self;
        };
        let mut parent = 0;
        for storage in storages {
            parent = self.child_or_insert(parent, storage, EntryKind::Storage);
        }
        let id = self.child_or_insert(parent, stream, EntryKind::Stream);
        self.nodes[id].data = data;
        self
    }

    fn child_or_insert(&mut self, parent: usize, name: &str, kind: EntryKind) -> usize {
        if let Some(&id) = self.nodes[parent]
            .children
            .iter()
            .find(|&&id| self.nodes[id].name == name)
        {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
            children: Vec::new(),
            data: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Serializes the document.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::too_many_lines)]
    pub fn finish(&self) -> Vec<u8> {
        // Mini stream placement
        let mut mini_stream = Vec::new();
        let mut mini_start = vec![ENDOFCHAIN; self.nodes.len()];
        let mut mini_chains = Vec::new();
        for (id, node) in self.nodes.iter().enumerate() {
            if node.kind == EntryKind::Stream && !node.data.is_empty() && node.data.len() < MINI_CUTOFF {
                let first = mini_stream.len() / MINI_SECTOR;
                let count = node.data.len().div_ceil(MINI_SECTOR);
                mini_start[id] = first as u32;
                mini_chains.push((first, count));
                mini_stream.extend_from_slice(&node.data);
                mini_stream.resize((first + count) * MINI_SECTOR, 0);
            }
        }
        let mini_sectors = mini_stream.len() / MINI_SECTOR;

        let entry_count = self.nodes.len().div_ceil(SECTOR / ENTRY_LEN) * (SECTOR / ENTRY_LEN);
        let n_dir = entry_count * ENTRY_LEN / SECTOR;
        let n_mini_fat = mini_sectors.div_ceil(IDS_PER_SECTOR);
        let n_mini_stream = mini_stream.len().div_ceil(SECTOR);
        let large: Vec<(usize, usize)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == EntryKind::Stream && n.data.len() >= MINI_CUTOFF)
            .map(|(id, n)| (id, n.data.len().div_ceil(SECTOR)))
            .collect();
        let n_large: usize = large.iter().map(|(_, count)| count).sum();
        let data_sectors = n_dir + n_mini_fat + n_mini_stream + n_large;

        let (mut n_fat, mut n_difat) = (0usize, 0usize);
        loop {
            let total = data_sectors + n_fat + n_difat;
            let fat = total.div_ceil(IDS_PER_SECTOR);
            let difat = fat
                .saturating_sub(HEADER_DIFAT_ENTRIES)
                .div_ceil(IDS_PER_SECTOR - 1);
            if fat == n_fat && difat == n_difat {
                break;
            }
            n_fat = fat;
            n_difat = difat;
        }

        let dir_start = n_fat + n_difat;
        let mini_fat_start = dir_start + n_dir;
        let mini_stream_start = mini_fat_start + n_mini_fat;
        let mut next_large = mini_stream_start + n_mini_stream;

        let mut fat = vec![FREESECT; n_fat * IDS_PER_SECTOR];
        for slot in fat.iter_mut().take(n_fat) {
            *slot = FATSECT;
        }
        for slot in fat.iter_mut().skip(n_fat).take(n_difat) {
            *slot = DIFSECT;
        }
        let chain = |fat: &mut Vec<u32>, start: usize, count: usize| {
            for i in start..start + count {
                fat[i] = if i + 1 == start + count { ENDOFCHAIN } else { (i + 1) as u32 };
            }
        };
        chain(&mut fat, dir_start, n_dir);
        chain(&mut fat, mini_fat_start, n_mini_fat);
        chain(&mut fat, mini_stream_start, n_mini_stream);

        let mut regular_start = vec![ENDOFCHAIN; self.nodes.len()];
        for &(id, count) in &large {
            regular_start[id] = next_large as u32;
            chain(&mut fat, next_large, count);
            next_large += count;
        }

        let mut mini_fat = vec![FREESECT; n_mini_fat * IDS_PER_SECTOR];
        for (first, count) in mini_chains {
            for i in first..first + count {
                mini_fat[i] = if i + 1 == first + count { ENDOFCHAIN } else { (i + 1) as u32 };
            }
        }

        // Header
        let mut out = Vec::with_capacity(HEADER_LEN + (data_sectors + n_fat + n_difat) * SECTOR);
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&0x003E_u16.to_le_bytes());
        out.extend_from_slice(&3_u16.to_le_bytes());
        out.extend_from_slice(&0xFFFE_u16.to_le_bytes());
        out.extend_from_slice(&9_u16.to_le_bytes());
        out.extend_from_slice(&6_u16.to_le_bytes());
        out.extend_from_slice(&[0u8; 6]);
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(&(n_fat as u32).to_le_bytes());
        out.extend_from_slice(&(dir_start as u32).to_le_bytes());
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(&(MINI_CUTOFF as u32).to_le_bytes());
        let first_mini_fat = if n_mini_fat > 0 { mini_fat_start as u32 } else { ENDOFCHAIN };
        out.extend_from_slice(&first_mini_fat.to_le_bytes());
        out.extend_from_slice(&(n_mini_fat as u32).to_le_bytes());
        let first_difat = if n_difat > 0 { n_fat as u32 } else { ENDOFCHAIN };
        out.extend_from_slice(&first_difat.to_le_bytes());
        out.extend_from_slice(&(n_difat as u32).to_le_bytes());
        for i in 0..HEADER_DIFAT_ENTRIES {
            let id = if i < n_fat { i as u32 } else { FREESECT };
            out.extend_from_slice(&id.to_le_bytes());
        }

        // FAT sectors
        for id in &fat {
            out.extend_from_slice(&id.to_le_bytes());
        }

        // DIFAT sectors
        let overflow: Vec<u32> = (HEADER_DIFAT_ENTRIES..n_fat).map(|i| i as u32).collect();
        for (i, ids) in overflow.chunks(IDS_PER_SECTOR - 1).enumerate() {
            for slot in 0..IDS_PER_SECTOR - 1 {
                out.extend_from_slice(&ids.get(slot).copied().unwrap_or(FREESECT).to_le_bytes());
            }
            let next = if i + 1 < n_difat { (n_fat + i + 1) as u32 } else { ENDOFCHAIN };
            out.extend_from_slice(&next.to_le_bytes());
        }

        // Directory
        for id in 0..entry_count {
            let mut raw = [0u8; ENTRY_LEN];
            if let Some(node) = self.nodes.get(id) {
                let units: Vec<u16> = node.name.encode_utf16().take(31).collect();
                for (i, unit) in units.iter().enumerate() {
                    raw[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
                }
                raw[64..66].copy_from_slice(&(((units.len() + 1) * 2) as u16).to_le_bytes());
                raw[66] = node.kind.to_byte();
                raw[67] = 1;

                let right = self
                    .sibling_after(id)
                    .map_or(NOSTREAM, |sibling| sibling as u32);
                let child = node.children.first().map_or(NOSTREAM, |&c| c as u32);
                raw[68..72].copy_from_slice(&NOSTREAM.to_le_bytes());
                raw[72..76].copy_from_slice(&right.to_le_bytes());
                raw[76..80].copy_from_slice(&child.to_le_bytes());

                let (start, size) = match node.kind {
                    EntryKind::Root if mini_stream.is_empty() => (ENDOFCHAIN, 0),
                    EntryKind::Root => (mini_stream_start as u32, mini_stream.len()),
                    EntryKind::Stream if node.data.len() >= MINI_CUTOFF => {
                        (regular_start[id], node.data.len())
                    }
                    EntryKind::Stream => (mini_start[id], node.data.len()),
                    EntryKind::Storage | EntryKind::Empty => (0, 0),
                };
                raw[116..120].copy_from_slice(&start.to_le_bytes());
                raw[120..128].copy_from_slice(&(size as u64).to_le_bytes());
            } else {
                raw[68..80].copy_from_slice(&[0xFF; 12]);
            }
            out.extend_from_slice(&raw);
        }

        // Mini FAT
        for id in &mini_fat {
            out.extend_from_slice(&id.to_le_bytes());
        }

        // Mini stream
        let mut padded = mini_stream;
        padded.resize(n_mini_stream * SECTOR, 0);
        out.extend_from_slice(&padded);

        // Large streams
        for &(id, count) in &large {
            let mut data = self.nodes[id].data.clone();
            data.resize(count * SECTOR, 0);
            out.extend_from_slice(&data);
        }

        out
    }

    fn sibling_after(&self, id: usize) -> Option<usize> {
        self.nodes.iter().find_map(|node| {
            let pos = node.children.iter().position(|&c| c == id)?;
            node.children.get(pos + 1).copied()
        })
    }
}
