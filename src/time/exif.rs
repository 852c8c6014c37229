//! EXIF capture time extraction for images

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{trace, warn};

/// Canonical EXIF datetime layout
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Read the original capture time from a file's EXIF metadata
///
/// Returns `Ok(None)` when the container carries no EXIF data, the
/// `DateTimeOriginal` tag is absent, or its value does not parse.
/// Unreadable or corrupt files are errors.
pub fn read_original_datetime(path: &Path) -> Result<Option<NaiveDateTime>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => {
            trace!(?path, "No EXIF data in container");
            return Ok(None);
        }
        Err(e) => {
            return Err(Error::ExifRead {
                path: path.to_path_buf(),
                message: e.to_string(),
            });
        }
    };

    let Some(field) = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY) else {
        trace!(?path, "No DateTimeOriginal tag");
        return Ok(None);
    };

    let raw = match &field.value {
        Value::Ascii(values) => values.first().and_then(|v| std::str::from_utf8(v).ok()),
        _ => None,
    };

    match raw.and_then(parse_exif_datetime) {
        Some(datetime) => {
            trace!(?path, %datetime, "Found EXIF capture time");
            Ok(Some(datetime))
        }
        None => {
            warn!(?path, value = ?raw, "Unparseable DateTimeOriginal tag");
            Ok(None)
        }
    }
}

/// Parse an EXIF datetime string: "YYYY:MM:DD HH:MM:SS"
fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(s, EXIF_DATETIME_FORMAT).ok()
}

/// Build a minimal JPEG whose EXIF block holds a single DateTimeOriginal tag
#[cfg(test)]
pub(crate) fn jpeg_with_original_datetime(value: &str) -> Vec<u8> {
    let mut ascii = value.as_bytes().to_vec();
    ascii.push(0);

    // Big-endian TIFF header, IFD0 at offset 8
    let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();

    // IFD0: ExifIFDPointer -> 26
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x8769u16.to_be_bytes());
    tiff.extend_from_slice(&4u16.to_be_bytes());
    tiff.extend_from_slice(&1u32.to_be_bytes());
    tiff.extend_from_slice(&26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());

    // Exif IFD: DateTimeOriginal, ASCII stored at 44
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&0x9003u16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&(ascii.len() as u32).to_be_bytes());
    tiff.extend_from_slice(&44u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(&ascii);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}
