//! Read-only access to compound document containers.
//!
//! A compound document is a small file system inside a file: a FAT maps
//! fixed-size sectors into chains, a directory names storages and streams,
//! and streams below the mini stream cutoff live in 64-byte mini sectors
//! carved out of the root entry's stream.
//!
//! [`CompoundFile`] borrows the input bytes and owns nothing else but the
//! decoded tables, so every resource it holds is released when it goes out
//! of scope, whichever way the caller leaves.

use std::collections::HashSet;

mod directory;
mod header;
#[cfg(any(test, feature = "test-util"))]
mod writer;

pub use directory::{DirEntry, EntryKind};
#[cfg(any(test, feature = "test-util"))]
pub use writer::CompoundWriter;

use directory::{ENTRY_LEN, NOSTREAM};
use header::{ENDOFCHAIN, FREESECT, HEADER_DIFAT_ENTRIES, Header, read_u32};

use crate::error::ParseError;

/// Id of the root entry.
pub const ROOT_ID: usize = 0;

/// A parsed compound document.
#[derive(Debug)]
pub struct CompoundFile<'a> {
    data: &'a [u8],
    sector_shift: u16,
    sector_size: usize,
    mini_sector_size: usize,
    mini_stream_cutoff: u64,
    fat: Vec<u32>,
    mini_fat: Vec<u32>,
    entries: Vec<DirEntry>,
    mini_stream: Vec<u8>,
}

impl<'a> CompoundFile<'a> {
    /// Opens a compound document from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header, FAT or directory is malformed.
    pub fn open(data: &'a [u8]) -> Result<Self, ParseError> {
        let header = Header::parse(data)?;

        let mut file = Self {
            data,
            sector_shift: header.sector_shift,
            sector_size: header.sector_size(),
            mini_sector_size: header.mini_sector_size(),
            mini_stream_cutoff: u64::from(header.mini_stream_cutoff),
            fat: Vec::new(),
            mini_fat: Vec::new(),
            entries: Vec::new(),
            mini_stream: Vec::new(),
        };

        file.fat = file.load_fat(&header)?;

        let dir_bytes = file.read_chain(header.first_dir_sector)?;
        file.entries = dir_bytes
            .chunks_exact(ENTRY_LEN)
            .map(|raw| DirEntry::parse(raw, header.major_version))
            .collect();

        let root = file
            .entries
            .first()
            .ok_or_else(|| ParseError::Directory("no root entry".to_string()))?;
        if root.kind != EntryKind::Root {
            return Err(ParseError::Directory(
                "first entry is not the root".to_string(),
            ));
        }
        let (root_start, root_size) = (root.start_sector, root.size);

        if header.num_mini_fat_sectors > 0 {
            let raw = file.read_chain(header.first_mini_fat_sector)?;
            file.mini_fat = to_u32s(&raw);
        }

        if root_start != ENDOFCHAIN && root_size > 0 {
            let mut mini_stream = file.read_chain(root_start)?;
            mini_stream.truncate(usize::try_from(root_size).unwrap_or(usize::MAX));
            file.mini_stream = mini_stream;
        }

        Ok(file)
    }

    /// Returns the entry with the given id.
    #[must_use]
    pub fn entry(&self, id: usize) -> Option<&DirEntry> {
        self.entries.get(id)
    }

    /// Returns the ids of the direct children of a storage, in tree order.
    ///
    /// # Errors
    ///
    /// Returns an error if the sibling tree references missing entries or
    /// contains a cycle.
    pub fn children(&self, id: usize) -> Result<Vec<usize>, ParseError> {
        let Some(parent) = self.entries.get(id) else {
            return Err(ParseError::Directory(format!("no entry {id}")));
        };

        let mut out = Vec::new();
        let mut visited = vec![false; self.entries.len()];
        let mut stack = Vec::new();
        let mut current = parent.child;

        loop {
            while current != NOSTREAM {
                let idx = self.entry_index(current)?;
                if visited[idx] {
                    return Err(ParseError::Directory(format!(
                        "entry {idx} appears twice under {id}"
                    )));
                }
                visited[idx] = true;
                stack.push(idx);
                current = self.entries[idx].left;
            }
            let Some(idx) = stack.pop() else { break };
            if self.entries[idx].kind != EntryKind::Empty {
                out.push(idx);
            }
            current = self.entries[idx].right;
        }

        Ok(out)
    }

    /// Finds a direct child of a storage by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage's sibling tree is malformed.
    pub fn find_child(&self, parent: usize, name: &str) -> Result<Option<usize>, ParseError> {
        Ok(self
            .children(parent)?
            .into_iter()
            .find(|&id| self.entries[id].name.eq_ignore_ascii_case(name)))
    }

    /// Reads the full contents of a stream entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is not a stream or its chain is broken.
    pub fn read_stream(&self, id: usize) -> Result<Vec<u8>, ParseError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| ParseError::Directory(format!("no entry {id}")))?;
        if !entry.is_stream() {
            return Err(ParseError::Directory(format!(
                "'{}' is not a stream",
                entry.name
            )));
        }
        if entry.size == 0 {
            return Ok(Vec::new());
        }

        let mut bytes = if entry.size < self.mini_stream_cutoff {
            self.read_mini_chain(entry.start_sector)?
        } else {
            self.read_chain(entry.start_sector)?
        };

        let expected = entry.size;
        match usize::try_from(expected) {
            Ok(len) if len <= bytes.len() => {
                bytes.truncate(len);
                Ok(bytes)
            }
            _ => Err(ParseError::Truncated {
                name: entry.name.clone(),
                expected,
                found: bytes.len(),
            }),
        }
    }

    fn entry_index(&self, raw: u32) -> Result<usize, ParseError> {
        usize::try_from(raw)
            .ok()
            .filter(|&idx| idx < self.entries.len())
            .ok_or_else(|| ParseError::Directory(format!("entry id {raw} out of range")))
    }

    fn load_fat(&self, header: &Header) -> Result<Vec<u32>, ParseError> {
        let available = self
            .data
            .len()
            .saturating_sub(self.sector_size)
            .div_ceil(self.sector_size);
        let wanted = usize::try_from(header.num_fat_sectors).unwrap_or(usize::MAX);
        if wanted > available {
            return Err(ParseError::Header(format!(
                "header announces {wanted} FAT sectors, file holds at most {available} sectors"
            )));
        }

        let mut fat_sectors: Vec<u32> = header
            .difat
            .iter()
            .copied()
            .take(wanted.min(HEADER_DIFAT_ENTRIES))
            .collect();

        let per_sector = self.sector_size / 4 - 1;
        let mut next = header.first_difat_sector;
        let mut remaining = header.num_difat_sectors;
        let mut visited = HashSet::new();
        while fat_sectors.len() < wanted && remaining > 0 && next != ENDOFCHAIN {
            if !visited.insert(next) {
                return Err(ParseError::ChainCycle(header.first_difat_sector));
            }
            let sector = self.sector(next)?;
            for i in 0..per_sector {
                if fat_sectors.len() == wanted {
                    break;
                }
                fat_sectors.push(read_u32(sector, i * 4));
            }
            next = read_u32(sector, per_sector * 4);
            remaining -= 1;
        }

        if fat_sectors.len() < wanted {
            return Err(ParseError::Header(format!(
                "header announces {wanted} FAT sectors, found {}",
                fat_sectors.len()
            )));
        }

        let mut fat = Vec::new();
        for id in fat_sectors {
            fat.extend(to_u32s(self.sector(id)?));
        }
        Ok(fat)
    }

    fn sector(&self, id: u32) -> Result<&'a [u8], ParseError> {
        if id >= ENDOFCHAIN - 1 {
            return Err(ParseError::SectorOutOfRange(id));
        }
        let start = (id as usize + 1) << self.sector_shift;
        if start >= self.data.len() {
            return Err(ParseError::SectorOutOfRange(id));
        }
        // The last sector of a file may be stored without padding
        let end = (start + self.sector_size).min(self.data.len());
        Ok(&self.data[start..end])
    }

    fn read_chain(&self, start: u32) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        for id in walk(&self.fat, start)? {
            out.extend_from_slice(self.sector(id)?);
        }
        Ok(out)
    }

    fn read_mini_chain(&self, start: u32) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        for id in walk(&self.mini_fat, start)? {
            let offset = id as usize * self.mini_sector_size;
            let chunk = self
                .mini_stream
                .get(offset..offset + self.mini_sector_size)
                .or_else(|| self.mini_stream.get(offset..))
                .filter(|chunk| !chunk.is_empty())
                .ok_or(ParseError::SectorOutOfRange(id))?;
            out.extend_from_slice(chunk);
        }
        Ok(out)
    }
}

/// Follows a chain through an allocation table.
fn walk(table: &[u32], start: u32) -> Result<Vec<u32>, ParseError> {
    let mut chain = Vec::new();
    let mut current = start;
    while current != ENDOFCHAIN {
        if current == FREESECT || current as usize >= table.len() {
            return Err(ParseError::SectorOutOfRange(current));
        }
        if chain.len() >= table.len() {
            return Err(ParseError::ChainCycle(start));
        }
        chain.push(current);
        current = table[current as usize];
    }
    Ok(chain)
}

fn to_u32s(raw: &[u8]) -> Vec<u32> {
    raw.chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut writer = CompoundWriter::new();
        writer.add_stream(&["small"], b"hello".to_vec());
        writer.add_stream(&["big"], vec![0xAB; 5000]);
        writer.add_stream(&["folder", "inner"], b"nested".to_vec());
        writer.add_stream(&["empty"], Vec::new());
        writer.finish()
    }

    #[test]
    fn test_open_and_list_root() {
        let data = sample();
        let file = CompoundFile::open(&data).unwrap();
        let names: Vec<&str> = file
            .children(ROOT_ID)
            .unwrap()
            .into_iter()
            .map(|id| file.entry(id).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["small", "big", "folder", "empty"]);
    }

    #[test]
    fn test_read_mini_and_regular_streams() {
        let data = sample();
        let file = CompoundFile::open(&data).unwrap();

        let small = file.find_child(ROOT_ID, "SMALL").unwrap().unwrap();
        assert_eq!(file.read_stream(small).unwrap(), b"hello");

        let big = file.find_child(ROOT_ID, "big").unwrap().unwrap();
        let content = file.read_stream(big).unwrap();
        assert_eq!(content.len(), 5000);
        assert!(content.iter().all(|&b| b == 0xAB));

        let empty = file.find_child(ROOT_ID, "empty").unwrap().unwrap();
        assert!(file.read_stream(empty).unwrap().is_empty());
    }

    #[test]
    fn test_nested_storage() {
        let data = sample();
        let file = CompoundFile::open(&data).unwrap();
        let folder = file.find_child(ROOT_ID, "folder").unwrap().unwrap();
        assert!(file.entry(folder).unwrap().is_storage());
        let inner = file.find_child(folder, "inner").unwrap().unwrap();
        assert_eq!(file.read_stream(inner).unwrap(), b"nested");
        assert!(file.read_stream(folder).is_err());
    }

    #[test]
    fn test_signature_only_is_rejected() {
        let mut data = crate::validate::SIGNATURE.to_vec();
        data.resize(100, 0);
        assert!(matches!(
            CompoundFile::open(&data),
            Err(ParseError::Header(_))
        ));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let data = sample();
        let cut = &data[..data.len() - 2048];
        assert!(CompoundFile::open(cut).and_then(|f| {
            let big = f.find_child(ROOT_ID, "big")?.unwrap_or(ROOT_ID);
            f.read_stream(big)
        })
        .is_err());
    }

    fn crafted_header(num_fat_sectors: u32, first_difat: u32, num_difat: u32) -> Vec<u8> {
        let mut data = vec![0u8; 1024];
        data[..8].copy_from_slice(&crate::validate::SIGNATURE);
        data[26..28].copy_from_slice(&3u16.to_le_bytes());
        data[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[30..32].copy_from_slice(&9u16.to_le_bytes());
        data[32..34].copy_from_slice(&6u16.to_le_bytes());
        data[44..48].copy_from_slice(&num_fat_sectors.to_le_bytes());
        data[68..72].copy_from_slice(&first_difat.to_le_bytes());
        data[72..76].copy_from_slice(&num_difat.to_le_bytes());
        data
    }

    #[test]
    fn test_oversized_fat_count_is_rejected() {
        let data = crafted_header(40_000_000, 0, u32::MAX);
        assert!(matches!(
            CompoundFile::open(&data),
            Err(ParseError::Header(msg)) if msg.contains("40000000")
        ));
    }

    #[test]
    fn test_self_referencing_difat_is_rejected() {
        // Sector 0 is all zeros, so its next-DIFAT pointer is sector 0 again.
        let mut data = crafted_header(300, 0, u32::MAX);
        data.resize(512 * 400, 0);
        assert!(matches!(
            CompoundFile::open(&data),
            Err(ParseError::ChainCycle(0))
        ));
    }

    #[test]
    fn test_walk_detects_cycle() {
        let table = vec![1, 0];
        assert_eq!(walk(&table, 0), Err(ParseError::ChainCycle(0)));
    }

    #[test]
    fn test_walk_rejects_out_of_range() {
        let table = vec![5];
        assert_eq!(walk(&table, 0), Err(ParseError::SectorOutOfRange(5)));
    }
}
