//! Binary save-file format.
//!
//! ## Binary Layout
//!
//! All integers are little-endian.
//!
//! | Size | Field |
//! |------|-------|
//! | 2 | Format version (`i16`, currently 1) |
//! | 1 | Mode (`0` full, `1` differential) |
//! | 4 | Voxel count (`i32`, interior cells of the chunk) |
//! | 4 | Non-air count (`i32`) |
//!
//! Full mode continues with `<payloadLen:i32>` and an LZ4 block (size
//! prepended) holding every interior voxel record as `u16` in interior-index
//! order. Differential mode continues with `<entryCount:i32>`, then
//! `entryCount` positions (`i32` interior indices), then `entryCount` voxel
//! records (`u16`). For differential saves the non-air count covers the
//! entries only.

use lattice_voxel::Voxel;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::error::PersistError;

/// Current format version.
pub const FORMAT_VERSION: i16 = 1;

/// Header size in bytes.
const HEADER_LEN: usize = 2 + 1 + 4 + 4;

/// Which encoding a file uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SaveMode {
    /// Whole interior, compressed.
    Full = 0,
    /// Edited cells only, as parallel position/record arrays.
    Differential = 1,
}

impl SaveMode {
    /// Decodes the mode byte.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Full),
            1 => Some(Self::Differential),
            _ => None,
        }
    }
}

/// Fixed-size file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaveHeader {
    /// Format version.
    pub version: i16,
    /// Encoding of the body.
    pub mode: SaveMode,
    /// Interior voxel count of the chunk that wrote the file.
    pub voxel_count: i32,
    /// Non-air records in the body.
    pub non_air_count: i32,
}

/// Decoded body of a save file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveRecord {
    /// Every interior voxel in interior-index order.
    Full(Vec<Voxel>),
    /// `(interior index, voxel)` pairs in file order.
    Differential(Vec<(u32, Voxel)>),
}

impl SaveRecord {
    /// Encoding this record came from.
    pub fn mode(&self) -> SaveMode {
        match self {
            Self::Full(_) => SaveMode::Full,
            Self::Differential(_) => SaveMode::Differential,
        }
    }
}

fn non_air<'a>(voxels: impl Iterator<Item = &'a Voxel>) -> i32 {
    voxels.filter(|v| !v.is_air()).count() as i32
}

fn write_header(buf: &mut Vec<u8>, mode: SaveMode, voxel_count: usize, non_air_count: i32) {
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.push(mode as u8);
    buf.extend_from_slice(&(voxel_count as i32).to_le_bytes());
    buf.extend_from_slice(&non_air_count.to_le_bytes());
}

/// Encodes a full snapshot of `voxels` (interior-index order).
pub fn encode_full(voxels: &[Voxel]) -> Vec<u8> {
    let raw: Vec<u8> = voxels.iter().flat_map(|v| v.raw().to_le_bytes()).collect();
    let compressed = compress_prepend_size(&raw);

    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + compressed.len());
    write_header(&mut buf, SaveMode::Full, voxels.len(), non_air(voxels.iter()));
    buf.extend_from_slice(&(compressed.len() as i32).to_le_bytes());
    buf.extend_from_slice(&compressed);
    buf
}

/// Encodes an edit list for a chunk of `voxel_count` interior cells.
pub fn encode_differential(voxel_count: usize, entries: &[(u32, Voxel)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + entries.len() * 6);
    write_header(
        &mut buf,
        SaveMode::Differential,
        voxel_count,
        non_air(entries.iter().map(|(_, v)| v)),
    );
    buf.extend_from_slice(&(entries.len() as i32).to_le_bytes());
    for &(pos, _) in entries {
        buf.extend_from_slice(&(pos as i32).to_le_bytes());
    }
    for &(_, voxel) in entries {
        buf.extend_from_slice(&voxel.raw().to_le_bytes());
    }
    buf
}

/// Little-endian cursor that reports truncation instead of panicking.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], PersistError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(PersistError::Truncated {
                expected: end,
                actual: self.data.len(),
            });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, PersistError> {
        Ok(self.take(1)?[0])
    }

    fn i16(&mut self) -> Result<i16, PersistError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    fn u16(&mut self) -> Result<u16, PersistError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Result<i32, PersistError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

fn check_count(what: &'static str, expected: i64, found: i64) -> Result<(), PersistError> {
    if expected != found {
        return Err(PersistError::CountMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// Decodes a save file for a chunk with `expected_voxels` interior cells.
///
/// Every failure is reported; a partially decoded body is never returned.
pub fn decode(data: &[u8], expected_voxels: usize) -> Result<(SaveHeader, SaveRecord), PersistError> {
    let mut r = Reader { data, pos: 0 };

    let version = r.i16()?;
    if version != FORMAT_VERSION {
        return Err(PersistError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }
    let mode_byte = r.u8()?;
    let mode = SaveMode::from_u8(mode_byte).ok_or(PersistError::UnknownMode(mode_byte))?;
    let voxel_count = r.i32()?;
    let non_air_count = r.i32()?;
    check_count("voxel count", expected_voxels as i64, voxel_count as i64)?;

    let header = SaveHeader {
        version,
        mode,
        voxel_count,
        non_air_count,
    };

    let record = match mode {
        SaveMode::Full => {
            let len = r.i32()?;
            if len < 0 {
                return Err(PersistError::CountMismatch {
                    what: "payload length",
                    expected: 0,
                    found: len as i64,
                });
            }
            let payload = r.take(len as usize)?;
            // The LZ4 size prefix drives the allocation; it must match the
            // already validated voxel count before anything is decompressed.
            let prefix = payload.get(..4).ok_or(PersistError::Truncated {
                expected: 4,
                actual: payload.len(),
            })?;
            let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
            check_count("payload size", voxel_count as i64 * 2, declared as i64)?;
            let raw = decompress_size_prepended(payload)
                .map_err(|e| PersistError::Decompress(e.to_string()))?;
            check_count("payload size", voxel_count as i64 * 2, raw.len() as i64)?;
            let voxels: Vec<Voxel> = raw
                .chunks_exact(2)
                .map(|b| Voxel::from_raw(u16::from_le_bytes([b[0], b[1]])))
                .collect();
            check_count("non-air count", non_air_count as i64, non_air(voxels.iter()) as i64)?;
            SaveRecord::Full(voxels)
        }
        SaveMode::Differential => {
            let count = r.i32()?;
            if count < 0 || count > voxel_count {
                return Err(PersistError::CountMismatch {
                    what: "entry count",
                    expected: voxel_count as i64,
                    found: count as i64,
                });
            }
            let mut positions = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let pos = r.i32()?;
                if pos < 0 || pos >= voxel_count {
                    return Err(PersistError::PositionOutOfRange(pos));
                }
                positions.push(pos as u32);
            }
            let mut entries = Vec::with_capacity(count as usize);
            for pos in positions {
                entries.push((pos, Voxel::from_raw(r.u16()?)));
            }
            check_count(
                "non-air count",
                non_air_count as i64,
                non_air(entries.iter().map(|(_, v)| v)) as i64,
            )?;
            SaveRecord::Differential(entries)
        }
    };

    Ok((header, record))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
