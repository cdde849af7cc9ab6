//! Binary decoders for the fixed-layout cell payloads found in SRUM tables
//! and WLAN profile metadata.
//!
//! All decoders take the raw little-endian payload of one cell and either
//! produce a typed value or fail; a short or malformed buffer is never
//! papered over with a substitute value.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use scroll::{Pread, LE};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{what} payload is {got} bytes, expected {expected}")]
    BadWidth {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{what} needs {need} bytes, buffer has {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },
    #[error("payload is not valid UTF-16LE")]
    InvalidUtf16,
    #[error("timestamp is outside the representable range")]
    TimestampRange,
    #[error("binary layout error: {0}")]
    Layout(#[from] scroll::Error),
}

fn fixed<const N: usize>(what: &'static str, data: &[u8]) -> Result<[u8; N], DecodeError> {
    data.try_into().map_err(|_| DecodeError::BadWidth {
        what,
        expected: N,
        got: data.len(),
    })
}

fn ole_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MIN)
}

fn windows_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1601, 1, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Decode an OLE automation timestamp: a little-endian IEEE-754 double
/// counting days (with fractional days) since 1899-12-30T00:00:00.
pub fn decode_ole_timestamp(data: &[u8]) -> Result<NaiveDateTime, DecodeError> {
    let days = f64::from_le_bytes(fixed("OLE timestamp", data)?);
    if !days.is_finite() {
        return Err(DecodeError::TimestampRange);
    }
    let micros = (days * 86_400_000_000.0) as i64;
    ole_epoch()
        .checked_add_signed(Duration::microseconds(micros))
        .ok_or(DecodeError::TimestampRange)
}

/// Decode a Windows FILETIME-style timestamp: a little-endian signed 64-bit
/// count of 100ns ticks since 1601-01-01T00:00:00, truncated to microseconds.
/// A negative tick count decodes to `None`.
pub fn decode_windows_timestamp(data: &[u8]) -> Result<Option<NaiveDateTime>, DecodeError> {
    let ticks = i64::from_le_bytes(fixed("Windows timestamp", data)?);
    if ticks < 0 {
        return Ok(None);
    }
    windows_epoch()
        .checked_add_signed(Duration::microseconds(ticks / 10))
        .map(Some)
        .ok_or(DecodeError::TimestampRange)
}

/// Decode a UTF-16LE string payload.
pub fn decode_utf16le(data: &[u8]) -> Result<String, DecodeError> {
    if data.len() % 2 != 0 {
        return Err(DecodeError::InvalidUtf16);
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16)
}

/// Decode a binary security identifier into its `S-R-A-S1-S2-...` text form.
///
/// Layout: revision byte, sub-authority count byte, 48-bit big-endian
/// authority, then count little-endian 32-bit sub-authorities.
pub fn decode_sid(data: &[u8]) -> Result<String, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::Truncated {
            what: "security identifier header",
            need: 8,
            got: data.len(),
        });
    }
    let revision = data[0];
    let count = data[1] as usize;
    let need = 8 + 4 * count;
    if data.len() < need {
        return Err(DecodeError::Truncated {
            what: "security identifier sub-authorities",
            need,
            got: data.len(),
        });
    }

    let mut authority = [0u8; 8];
    authority[2..].copy_from_slice(&data[2..8]);
    let authority = u64::from_be_bytes(authority);

    let mut sid = format!("S-{revision}-{authority}");
    for index in 0..count {
        let sub: u32 = data.pread_with(8 + 4 * index, LE)?;
        sid.push('-');
        sid.push_str(&sub.to_string());
    }
    Ok(sid)
}

/// The three fields packed into a WLAN channel-hints blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHints {
    pub name_length: u32,
    pub name: Vec<u8>,
    pub ssid_hex: String,
}

/// Decode a channel-hints blob: `NameLength` (u32 LE at offset 0), `Name`
/// (`NameLength` bytes at offset 4) and the SSID bytes at absolute offset 36
/// (up to 32, hex-rendered). The SSID offset does not move with `NameLength`.
pub fn decode_channel_hints(data: &[u8]) -> Result<ChannelHints, DecodeError> {
    let name_length: u32 = data.pread_with(0, LE)?;
    let name_end = 4 + name_length as usize;
    if data.len() < name_end {
        return Err(DecodeError::Truncated {
            what: "channel hints name",
            need: name_end,
            got: data.len(),
        });
    }
    let name = data[4..name_end].to_vec();

    let ssid_hex = if data.len() > 36 {
        hex::encode(&data[36..data.len().min(36 + 32)])
    } else {
        String::new()
    };

    Ok(ChannelHints {
        name_length,
        name,
        ssid_hex,
    })
}

/// Render a 16-byte GUID cell as lowercase RFC-4122 text, bytes taken
/// big-endian as stored.
pub fn format_guid(data: &[u8]) -> Result<String, DecodeError> {
    let b: [u8; 16] = fixed("GUID", data)?;
    Ok(format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
        b[14], b[15]
    ))
}
