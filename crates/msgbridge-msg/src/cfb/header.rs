//! Compound document header.

use crate::error::ParseError;
use crate::validate::SIGNATURE;

/// Size of the fixed header structure.
pub const HEADER_LEN: usize = 512;
/// Number of FAT sector ids stored directly in the header.
pub const HEADER_DIFAT_ENTRIES: usize = 109;

/// Sector id marking a free sector.
pub const FREESECT: u32 = 0xFFFF_FFFF;
/// Sector id terminating a chain.
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
/// Sector id marking a FAT sector.
#[cfg(any(test, feature = "test-util"))]
pub const FATSECT: u32 = 0xFFFF_FFFD;
/// Sector id marking a DIFAT sector.
#[cfg(any(test, feature = "test-util"))]
pub const DIFSECT: u32 = 0xFFFF_FFFC;

/// Parsed header fields needed to walk the file.
#[derive(Debug, Clone)]
pub struct Header {
    pub major_version: u16,
    pub sector_shift: u16,
    pub mini_sector_shift: u16,
    pub num_fat_sectors: u32,
    pub first_dir_sector: u32,
    pub mini_stream_cutoff: u32,
    pub first_mini_fat_sector: u32,
    pub num_mini_fat_sectors: u32,
    pub first_difat_sector: u32,
    pub num_difat_sectors: u32,
    pub difat: Vec<u32>,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_LEN {
            return Err(ParseError::Header(format!(
                "file is {} bytes, header needs {HEADER_LEN}",
                data.len()
            )));
        }
        if data[..8] != SIGNATURE {
            return Err(ParseError::Header("bad signature".to_string()));
        }
        if read_u16(data, 28) != 0xFFFE {
            return Err(ParseError::Header("unsupported byte order".to_string()));
        }

        let major_version = read_u16(data, 26);
        let sector_shift = read_u16(data, 30);
        match (major_version, sector_shift) {
            (3, 9) | (4, 12) => {}
            _ => {
                return Err(ParseError::Header(format!(
                    "unsupported version {major_version} with sector shift {sector_shift}"
                )));
            }
        }

        let mini_sector_shift = read_u16(data, 32);
        if mini_sector_shift != 6 {
            return Err(ParseError::Header(format!(
                "unsupported mini sector shift {mini_sector_shift}"
            )));
        }

        let difat = (0..HEADER_DIFAT_ENTRIES)
            .map(|i| read_u32(data, 76 + i * 4))
            .collect();

        Ok(Self {
            major_version,
            sector_shift,
            mini_sector_shift,
            num_fat_sectors: read_u32(data, 44),
            first_dir_sector: read_u32(data, 48),
            mini_stream_cutoff: read_u32(data, 56),
            first_mini_fat_sector: read_u32(data, 60),
            num_mini_fat_sectors: read_u32(data, 64),
            first_difat_sector: read_u32(data, 68),
            num_difat_sectors: read_u32(data, 72),
            difat,
        })
    }

    pub const fn sector_size(&self) -> usize {
        1 << self.sector_shift
    }

    pub const fn mini_sector_size(&self) -> usize {
        1 << self.mini_sector_shift
    }
}

/// Reads a little-endian `u16`, yielding 0 past the end of input.
pub fn read_u16(data: &[u8], offset: usize) -> u16 {
    data.get(offset..offset + 2)
        .map_or(0, |b| u16::from_le_bytes([b[0], b[1]]))
}

/// Reads a little-endian `u32`, yielding 0 past the end of input.
pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    data.get(offset..offset + 4)
        .map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Reads a little-endian `u64`, yielding 0 past the end of input.
pub fn read_u64(data: &[u8], offset: usize) -> u64 {
    data.get(offset..offset + 8).map_or(0, |b| {
        u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
    })
}
