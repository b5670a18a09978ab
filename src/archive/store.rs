//! Minimal uncompressed (STORE) ZIP writer
//!
//! Used when the library-backed tiers cannot finish. Every entry is written
//! as a local file header + name + raw bytes, followed by a central directory
//! and an end-of-central-directory record. No ZIP64, so entry count and
//! offsets must fit the classic 16/32-bit fields.

use crate::archive::ZipEntry;
use crate::ArchiveError;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::sync::OnceLock;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4b50;

/// Version 1.0 is enough to extract stored entries
const VERSION_NEEDED: u16 = 10;
const VERSION_MADE_BY: u16 = 20;
/// General purpose flag bit 11: names are UTF-8
const FLAG_UTF8: u16 = 0x0800;
const METHOD_STORE: u16 = 0;

/// The reflected CRC-32 table (polynomial `0xEDB88320`), built once
fn crc_table() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (n, slot) in table.iter_mut().enumerate() {
            let mut c = n as u32;
            for _ in 0..8 {
                c = if c & 1 != 0 {
                    0xEDB8_8320 ^ (c >> 1)
                } else {
                    c >> 1
                };
            }
            *slot = c;
        }
        table
    })
}

/// Standard CRC-32 of `data`
pub fn crc32(data: &[u8]) -> u32 {
    let table = crc_table();
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = table[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

/// MS-DOS (time, date) pair; years before 1980 clamp to 1980
fn dos_timestamp(now: DateTime<Utc>) -> (u16, u16) {
    let year = now.year().clamp(1980, 2107) as u16;
    let time = ((now.hour() as u16) << 11) | ((now.minute() as u16) << 5) | (now.second() as u16 / 2);
    let date = ((year - 1980) << 9) | ((now.month() as u16) << 5) | now.day() as u16;
    (time, date)
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn fit_u32(value: usize, what: &str) -> Result<u32, ArchiveError> {
    u32::try_from(value).map_err(|_| ArchiveError::Encode(format!("{} exceeds 4 GiB", what)))
}

/// Encodes `entries` as a STORE-method ZIP archive
///
/// # Errors
///
/// Returns [`ArchiveError::Encode`] when the archive would need ZIP64
/// (more than 65535 entries or offsets past 4 GiB).
pub fn encode_store(entries: &[ZipEntry]) -> Result<Vec<u8>, ArchiveError> {
    encode_store_at(entries, Utc::now())
}

pub(crate) fn encode_store_at(
    entries: &[ZipEntry],
    modified: DateTime<Utc>,
) -> Result<Vec<u8>, ArchiveError> {
    let count = u16::try_from(entries.len())
        .map_err(|_| ArchiveError::Encode(format!("{} entries exceed 65535", entries.len())))?;
    let (time, date) = dos_timestamp(modified);

    let mut out = Vec::new();
    let mut central = Vec::new();

    for entry in entries {
        let name = entry.path.as_bytes();
        let name_len = u16::try_from(name.len())
            .map_err(|_| ArchiveError::Encode(format!("entry name too long: {}", entry.path)))?;
        let size = fit_u32(entry.data.len(), &entry.path)?;
        let crc = crc32(&entry.data);
        let offset = fit_u32(out.len(), "archive")?;

        put_u32(&mut out, LOCAL_HEADER_SIGNATURE);
        put_u16(&mut out, VERSION_NEEDED);
        put_u16(&mut out, FLAG_UTF8);
        put_u16(&mut out, METHOD_STORE);
        put_u16(&mut out, time);
        put_u16(&mut out, date);
        put_u32(&mut out, crc);
        put_u32(&mut out, size);
        put_u32(&mut out, size);
        put_u16(&mut out, name_len);
        put_u16(&mut out, 0);
        out.extend_from_slice(name);
        out.extend_from_slice(&entry.data);

        put_u32(&mut central, CENTRAL_HEADER_SIGNATURE);
        put_u16(&mut central, VERSION_MADE_BY);
        put_u16(&mut central, VERSION_NEEDED);
        put_u16(&mut central, FLAG_UTF8);
        put_u16(&mut central, METHOD_STORE);
        put_u16(&mut central, time);
        put_u16(&mut central, date);
        put_u32(&mut central, crc);
        put_u32(&mut central, size);
        put_u32(&mut central, size);
        put_u16(&mut central, name_len);
        put_u16(&mut central, 0); // extra
        put_u16(&mut central, 0); // comment
        put_u16(&mut central, 0); // disk
        put_u16(&mut central, 0); // internal attributes
        put_u32(&mut central, 0); // external attributes
        put_u32(&mut central, offset);
        central.extend_from_slice(name);
    }

    let central_offset = fit_u32(out.len(), "archive")?;
    let central_size = fit_u32(central.len(), "central directory")?;
    out.extend_from_slice(&central);

    put_u32(&mut out, END_OF_CENTRAL_DIR_SIGNATURE);
    put_u16(&mut out, 0);
    put_u16(&mut out, 0);
    put_u16(&mut out, count);
    put_u16(&mut out, count);
    put_u32(&mut out, central_size);
    put_u32(&mut out, central_offset);
    put_u16(&mut out, 0);

    Ok(out)
}
