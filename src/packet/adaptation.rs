//! Adaptation field (ISO/IEC 13818-1 2.4.3.4) and its extension.
//!
//! Byte-granular framing goes through [`ByteReader`]; the bit-packed
//! subfields (PCR, LTW, piecewise rate, seamless splice) are decoded with
//! `bitstream-io`.

use bitstream_io::{BigEndian, BitRead, BitReader};
use bytes::{BufMut, Bytes};
use serde::Serialize;

use crate::error::{DemuxError, Result};
use crate::reader::ByteReader;

fn truncated(what: &str) -> DemuxError {
    DemuxError::invalid(format!("truncated {what} in adaptation field"))
}

/// Program Clock Reference: 33-bit base @ 90 kHz + 9-bit extension @ 27 MHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClockReference {
    pub base: u64,
    pub extension: u16,
}

impl ClockReference {
    pub const BASE_MAX: u64 = (1 << 33) - 1;
    pub const EXTENSION_MAX: u16 = (1 << 9) - 1;

    /// Layout: 33 bits base, 6 reserved bits, 9 bits extension.
    fn decode(raw: &[u8]) -> Result<Self> {
        let mut br = BitReader::endian(raw, BigEndian);
        let base = br.read::<33, u64>().map_err(|_| truncated("PCR"))?;
        br.skip(6).map_err(|_| truncated("PCR"))?;
        let extension = br.read::<9, u16>().map_err(|_| truncated("PCR"))?;
        Ok(Self { base, extension })
    }

    fn encode(&self, out: &mut impl BufMut) {
        let base = self.base & Self::BASE_MAX;
        let ext = u64::from(self.extension & Self::EXTENSION_MAX);
        let packed = (base << 15) | (0x3F << 9) | ext;
        out.put_slice(&packed.to_be_bytes()[2..]);
    }

    /// Full value in 27 MHz ticks.
    pub fn as_27mhz(&self) -> u64 {
        self.base * 300 + u64::from(self.extension)
    }

    pub fn as_seconds(&self) -> f64 {
        self.as_27mhz() as f64 / 27_000_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LegalTimeWindow {
    pub valid: bool,
    pub offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeamlessSplice {
    pub splice_type: u8,
    /// 33-bit DTS of the next access unit; marker bits are not checked.
    pub dts_next_au: u64,
}

/// Adaptation field extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AdaptationExtension {
    /// Declared `adaptation_field_extension_length`.
    pub length: u8,
    pub legal_time_window: Option<LegalTimeWindow>,
    /// 22-bit piecewise rate.
    pub piecewise_rate: Option<u32>,
    pub seamless_splice: Option<SeamlessSplice>,
}

impl AdaptationExtension {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let length = r.read_u8().map_err(|_| truncated("extension length"))?;
        let mut ext = Self {
            length,
            legal_time_window: None,
            piecewise_rate: None,
            seamless_splice: None,
        };
        if length == 0 {
            return Ok(ext);
        }
        let mut r = r
            .sub_reader(usize::from(length))
            .map_err(|_| truncated("extension"))?;
        let flags = r.read_u8()?;

        if flags & 0x80 != 0 {
            let raw = r.read_bytes(2).map_err(|_| truncated("legal time window"))?;
            let mut br = BitReader::endian(raw, BigEndian);
            let valid = br.read_bit().map_err(|_| truncated("legal time window"))?;
            let offset = br
                .read::<15, u16>()
                .map_err(|_| truncated("legal time window"))?;
            ext.legal_time_window = Some(LegalTimeWindow { valid, offset });
        }

        if flags & 0x40 != 0 {
            let raw = r.read_bytes(3).map_err(|_| truncated("piecewise rate"))?;
            let mut br = BitReader::endian(raw, BigEndian);
            br.skip(2).map_err(|_| truncated("piecewise rate"))?;
            let rate = br.read::<22, u32>().map_err(|_| truncated("piecewise rate"))?;
            ext.piecewise_rate = Some(rate);
        }

        if flags & 0x20 != 0 {
            let raw = r.read_bytes(5).map_err(|_| truncated("seamless splice"))?;
            let mut br = BitReader::endian(raw, BigEndian);
            let mut read = || -> std::io::Result<SeamlessSplice> {
                let splice_type = br.read::<4, u8>()?;
                let hi = br.read::<3, u64>()?;
                br.skip(1)?;
                let mid = br.read::<15, u64>()?;
                br.skip(1)?;
                let lo = br.read::<15, u64>()?;
                br.skip(1)?;
                Ok(SeamlessSplice {
                    splice_type,
                    dts_next_au: (hi << 30) | (mid << 15) | lo,
                })
            };
            ext.seamless_splice = Some(read().map_err(|_| truncated("seamless splice"))?);
        }

        Ok(ext)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u8(self.length);
        if self.length == 0 {
            return;
        }
        let start = out.len();
        let flags = (u8::from(self.legal_time_window.is_some()) << 7)
            | (u8::from(self.piecewise_rate.is_some()) << 6)
            | (u8::from(self.seamless_splice.is_some()) << 5)
            | 0x1F;
        out.put_u8(flags);
        if let Some(ltw) = self.legal_time_window {
            out.put_u16((u16::from(ltw.valid) << 15) | (ltw.offset & 0x7FFF));
        }
        if let Some(rate) = self.piecewise_rate {
            let packed = 0xC0_0000 | (rate & 0x3F_FFFF);
            out.put_slice(&packed.to_be_bytes()[1..]);
        }
        if let Some(splice) = self.seamless_splice {
            let dts = splice.dts_next_au;
            let packed: u64 = (u64::from(splice.splice_type & 0x0F) << 36)
                | (((dts >> 30) & 0x07) << 33)
                | (1 << 32)
                | (((dts >> 15) & 0x7FFF) << 17)
                | (1 << 16)
                | ((dts & 0x7FFF) << 1)
                | 1;
            out.put_slice(&packed.to_be_bytes()[3..]);
        }
        let written = out.len() - start;
        out.resize(start + usize::from(self.length).max(written), 0xFF);
    }
}

/// Decoded adaptation field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AdaptationField {
    /// Declared `adaptation_field_length` (excluding the length byte).
    pub length: u8,
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    pub es_priority_indicator: bool,
    pub pcr: Option<ClockReference>,
    pub opcr: Option<ClockReference>,
    pub splice_countdown: Option<i8>,
    pub transport_private_data: Option<Bytes>,
    pub extension: Option<AdaptationExtension>,
}

impl AdaptationField {
    fn empty(length: u8) -> Self {
        Self {
            length,
            discontinuity_indicator: false,
            random_access_indicator: false,
            es_priority_indicator: false,
            pcr: None,
            opcr: None,
            splice_countdown: None,
            transport_private_data: None,
            extension: None,
        }
    }

    /// Parse the `data.len()` bytes that follow the length byte.
    ///
    /// Every optional subfield is decoded in declared order; truncation inside
    /// a flagged subfield is `InvalidData`. Trailing bytes are stuffing.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let length = u8::try_from(data.len())
            .map_err(|_| DemuxError::invalid("adaptation field longer than 255 bytes"))?;
        let mut af = Self::empty(length);
        if data.is_empty() {
            return Ok(af);
        }

        let mut r = ByteReader::new(data);
        let flags = r.read_u8()?;
        af.discontinuity_indicator = flags & 0x80 != 0;
        af.random_access_indicator = flags & 0x40 != 0;
        af.es_priority_indicator = flags & 0x20 != 0;

        if flags & 0x10 != 0 {
            let raw = r.read_bytes(6).map_err(|_| truncated("PCR"))?;
            af.pcr = Some(ClockReference::decode(raw)?);
        }
        if flags & 0x08 != 0 {
            let raw = r.read_bytes(6).map_err(|_| truncated("OPCR"))?;
            af.opcr = Some(ClockReference::decode(raw)?);
        }
        if flags & 0x04 != 0 {
            let v = r.read_u8().map_err(|_| truncated("splice countdown"))?;
            af.splice_countdown = Some(v as i8);
        }
        if flags & 0x02 != 0 {
            let len = r.read_u8().map_err(|_| truncated("private data length"))?;
            let raw = r
                .read_bytes(usize::from(len))
                .map_err(|_| truncated("private data"))?;
            af.transport_private_data = Some(Bytes::copy_from_slice(raw));
        }
        if flags & 0x01 != 0 {
            af.extension = Some(AdaptationExtension::parse(&mut r)?);
        }
        Ok(af)
    }

    /// Bytes the field occupies on the wire, length byte included.
    pub fn wire_size(&self) -> usize {
        1 + usize::from(self.length)
    }

    /// Write length byte, flags, subfields and 0xFF stuffing up to `length`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.put_u8(self.length);
        if self.length == 0 {
            return;
        }
        let start = out.len();
        let flags = (u8::from(self.discontinuity_indicator) << 7)
            | (u8::from(self.random_access_indicator) << 6)
            | (u8::from(self.es_priority_indicator) << 5)
            | (u8::from(self.pcr.is_some()) << 4)
            | (u8::from(self.opcr.is_some()) << 3)
            | (u8::from(self.splice_countdown.is_some()) << 2)
            | (u8::from(self.transport_private_data.is_some()) << 1)
            | u8::from(self.extension.is_some());
        out.put_u8(flags);
        if let Some(pcr) = &self.pcr {
            pcr.encode(out);
        }
        if let Some(opcr) = &self.opcr {
            opcr.encode(out);
        }
        if let Some(countdown) = self.splice_countdown {
            out.put_i8(countdown);
        }
        if let Some(data) = &self.transport_private_data {
            out.put_u8(data.len() as u8);
            out.put_slice(data);
        }
        if let Some(ext) = &self.extension {
            ext.encode(out);
        }
        let written = out.len() - start;
        out.resize(start + usize::from(self.length).max(written), 0xFF);
    }
}
