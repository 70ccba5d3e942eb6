//! Container structure checks for encoded images.
//!
//! A full decode catches truncated pixel data but some decoders accept a
//! damaged container (bad chunk checksums, missing end markers). These
//! walkers re-read the raw bytes from the start and verify the container
//! layout for each supported format:
//!
//! | Format | Checks |
//! |---|---|
//! | PNG | signature, chunk bounds, chunk CRC-32, `IHDR` first, `IDAT` present, `IEND` |
//! | JPEG | `SOI`, segment bounds, `SOS` present, `EOI` after entropy data |
//! | GIF | header, logical screen descriptor, trailer byte |
//! | TIFF | byte order, magic 42, first IFD and its entry table in bounds |
//! | WebP | `RIFF` size, `WEBP` tag, chunk bounds |
//!
//! Formats without a walker pass (the decode check still applies).

use image::ImageFormat;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{format} structure: {reason}")]
pub struct StructureError {
    pub format: &'static str,
    pub reason: String,
}

fn fail(format: &'static str, reason: impl Into<String>) -> StructureError {
    StructureError {
        format,
        reason: reason.into(),
    }
}

/// Verify the container structure of `data` for `format`.
pub fn verify(format: ImageFormat, data: &[u8]) -> Result<(), StructureError> {
    match format {
        ImageFormat::Png => verify_png(data),
        ImageFormat::Jpeg => verify_jpeg(data),
        ImageFormat::Gif => verify_gif(data),
        ImageFormat::Tiff => verify_tiff(data),
        ImageFormat::WebP => verify_webp(data),
        _ => Ok(()),
    }
}

fn be_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn le_u32(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// CRC-32 (IEEE 802.3, reflected) as used by PNG chunks.
fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in bytes {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// Chunk layout: length (4, BE) + type (4) + data (length) + CRC (4) over type + data.
fn verify_png(data: &[u8]) -> Result<(), StructureError> {
    const F: &str = "PNG";
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(fail(F, "bad signature"));
    }

    let mut pos = PNG_SIGNATURE.len();
    let mut first = true;
    let mut seen_idat = false;

    while pos + 8 <= data.len() {
        let length = be_u32(data, pos) as usize;
        if length > i32::MAX as usize {
            return Err(fail(F, format!("chunk length {length} out of range")));
        }
        let kind = &data[pos + 4..pos + 8];
        let end = pos + 8 + length + 4;
        if end > data.len() {
            return Err(fail(
                F,
                format!("chunk {} runs past end of data", String::from_utf8_lossy(kind)),
            ));
        }

        let stored = be_u32(data, pos + 8 + length);
        if crc32(&data[pos + 4..pos + 8 + length]) != stored {
            return Err(fail(
                F,
                format!("CRC mismatch in chunk {}", String::from_utf8_lossy(kind)),
            ));
        }

        if first && (kind != b"IHDR" || length != 13) {
            return Err(fail(F, "first chunk is not a valid IHDR"));
        }
        first = false;

        match kind {
            b"IDAT" => seen_idat = true,
            b"IEND" => {
                if !seen_idat {
                    return Err(fail(F, "no IDAT before IEND"));
                }
                return Ok(());
            }
            _ => {}
        }
        pos = end;
    }

    Err(fail(F, "missing IEND"))
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

/// Walk marker segments from `SOI` to `EOI`, skipping entropy-coded data
/// after each `SOS` (progressive files have several scans).
fn verify_jpeg(data: &[u8]) -> Result<(), StructureError> {
    const F: &str = "JPEG";
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(fail(F, "missing SOI"));
    }

    let mut pos = 2;
    let mut seen_sos = false;

    loop {
        // Fill bytes before a marker are allowed
        while pos < data.len() && data[pos] == 0xFF && pos + 1 < data.len() && data[pos + 1] == 0xFF {
            pos += 1;
        }
        if pos + 2 > data.len() {
            return Err(fail(F, "missing EOI"));
        }
        if data[pos] != 0xFF {
            return Err(fail(F, format!("expected marker at offset {pos}")));
        }

        let marker = data[pos + 1];
        match marker {
            0xD9 => {
                if !seen_sos {
                    return Err(fail(F, "EOI before any scan"));
                }
                return Ok(());
            }
            // Markers without length field
            0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            0xD8 => return Err(fail(F, "nested SOI")),
            _ => {}
        }

        if pos + 4 > data.len() {
            return Err(fail(F, "truncated segment header"));
        }
        let seg_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if seg_len < 2 || pos + 2 + seg_len > data.len() {
            return Err(fail(F, format!("segment 0x{marker:02X} runs past end of data")));
        }
        pos += 2 + seg_len;

        if marker == 0xDA {
            seen_sos = true;
            pos = skip_entropy_data(data, pos).ok_or_else(|| fail(F, "scan data not terminated"))?;
        }
    }
}

/// Return the offset of the first real marker after entropy-coded data.
///
/// Inside scan data, `FF 00` is a stuffed byte and `FF D0..D7` are restart
/// markers; anything else after `FF` ends the scan.
fn skip_entropy_data(data: &[u8], mut pos: usize) -> Option<usize> {
    while pos + 1 < data.len() {
        if data[pos] == 0xFF {
            let next = data[pos + 1];
            if next == 0x00 || (0xD0..=0xD7).contains(&next) || next == 0xFF {
                pos += if next == 0xFF { 1 } else { 2 };
                continue;
            }
            return Some(pos);
        }
        pos += 1;
    }
    None
}

// ---------------------------------------------------------------------------
// GIF
// ---------------------------------------------------------------------------

fn verify_gif(data: &[u8]) -> Result<(), StructureError> {
    const F: &str = "GIF";
    if !(data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")) {
        return Err(fail(F, "bad header"));
    }
    // Header (6) + logical screen descriptor (7) + trailer (1)
    if data.len() < 14 {
        return Err(fail(F, "too short"));
    }
    if data.last() != Some(&0x3B) {
        return Err(fail(F, "missing trailer"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

fn verify_tiff(data: &[u8]) -> Result<(), StructureError> {
    const F: &str = "TIFF";
    if data.len() < 8 {
        return Err(fail(F, "too short"));
    }

    let big_endian = match &data[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return Err(fail(F, "bad byte order mark")),
    };
    let read_u16 = |offset: usize| -> u16 {
        if big_endian {
            u16::from_be_bytes([data[offset], data[offset + 1]])
        } else {
            u16::from_le_bytes([data[offset], data[offset + 1]])
        }
    };
    let read_u32 = |offset: usize| -> u32 {
        if big_endian {
            be_u32(data, offset)
        } else {
            le_u32(data, offset)
        }
    };

    if read_u16(2) != 42 {
        return Err(fail(F, "bad magic"));
    }
    let ifd = read_u32(4) as usize;
    if ifd < 8 || ifd + 2 > data.len() {
        return Err(fail(F, "first IFD offset out of bounds"));
    }
    let entries = read_u16(ifd) as usize;
    // Entry table (12 bytes each) + next-IFD offset (4)
    if entries == 0 || ifd + 2 + entries * 12 + 4 > data.len() {
        return Err(fail(F, "IFD entry table out of bounds"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WebP
// ---------------------------------------------------------------------------

fn verify_webp(data: &[u8]) -> Result<(), StructureError> {
    const F: &str = "WebP";
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WEBP" {
        return Err(fail(F, "bad RIFF header"));
    }
    let riff_end = 8 + le_u32(data, 4) as usize;
    if riff_end > data.len() {
        return Err(fail(F, "RIFF size exceeds data"));
    }

    let mut pos = 12;
    let mut chunks = 0;
    while pos + 8 <= riff_end {
        let size = le_u32(data, pos + 4) as usize;
        // Chunks are padded to even length
        let next = pos + 8 + size + (size % 2);
        if pos + 8 + size > riff_end {
            return Err(fail(F, "chunk runs past RIFF end"));
        }
        chunks += 1;
        pos = next;
    }
    if chunks == 0 {
        return Err(fail(F, "no chunks"));
    }
    Ok(())
}
