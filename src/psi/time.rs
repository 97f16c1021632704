// psi/time.rs
//! DVB time encodings: 40-bit MJD + BCD UTC, 24-bit BCD durations.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::{DemuxError, Result};
use crate::reader::ByteReader;

fn bcd(byte: u8) -> Result<u8> {
    let (hi, lo) = (byte >> 4, byte & 0x0F);
    if hi > 9 || lo > 9 {
        return Err(DemuxError::invalid(format!("0x{byte:02X} is not BCD")));
    }
    Ok(hi * 10 + lo)
}

fn bcd_hms(raw: u32) -> Result<(u8, u8, u8)> {
    let [_, h, m, s] = raw.to_be_bytes();
    Ok((bcd(h)?, bcd(m)?, bcd(s)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UtcTime {
    /// Modified Julian Date, days since 1858-11-17.
    pub mjd: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl UtcTime {
    /// Read 5 bytes. All ones means "undefined" and yields `None`.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Option<Self>> {
        let raw = r.read_u40()?;
        if raw == 0xFF_FFFF_FFFF {
            return Ok(None);
        }
        let (hour, minute, second) = bcd_hms((raw & 0xFF_FFFF) as u32)?;
        Ok(Some(Self {
            mjd: (raw >> 24) as u16,
            hour,
            minute,
            second,
        }))
    }

    /// Gregorian (year, month, day), ETSI EN 300 468 annex C.
    pub fn ymd(&self) -> (i32, u32, u32) {
        let mjd = f64::from(self.mjd);
        let y1 = ((mjd - 15078.2) / 365.25).floor();
        let m1 = ((mjd - 14956.1 - (y1 * 365.25).floor()) / 30.6001).floor();
        let day = mjd - 14956.0 - (y1 * 365.25).floor() - (m1 * 30.6001).floor();
        let k = if m1 == 14.0 || m1 == 15.0 { 1.0 } else { 0.0 };
        let year = y1 + k + 1900.0;
        let month = m1 - 1.0 - k * 12.0;
        (year as i32, month as u32, day as u32)
    }

    /// `None` when the fields do not form a valid calendar time.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let (y, m, d) = self.ymd();
        NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
        )
    }
}

/// Event duration, 6 BCD digits hhmmss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BcdDuration {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

impl BcdDuration {
    pub fn read(r: &mut ByteReader<'_>) -> Result<Option<Self>> {
        let raw = r.read_u24()?;
        if raw == 0xFF_FFFF {
            return Ok(None);
        }
        let (hours, minutes, seconds) = bcd_hms(raw)?;
        Ok(Some(Self {
            hours,
            minutes,
            seconds,
        }))
    }

    pub fn as_secs(&self) -> u32 {
        u32::from(self.hours) * 3600 + u32::from(self.minutes) * 60 + u32::from(self.seconds)
    }
}
