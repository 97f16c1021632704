//! PES unit assembly (ISO/IEC 13818-1 2.4.3.7).
//!
//! Payload bytes are gathered from one unit start to the next, or until the
//! declared `PES_packet_length` is satisfied.

use bitstream_io::{BigEndian, BitRead, BitReader};
use bytes::Bytes;
use log::warn;
use serde::Serialize;

use crate::constants::{ACCUMULATOR_INITIAL_CAPACITY, PES_START_CODE};
use crate::error::{DemuxError, Result};

const PES_FIXED_HEADER: usize = 6;

// stream_ids without the optional PES header
const STREAM_ID_PROGRAM_STREAM_MAP: u8 = 0xBC;
const STREAM_ID_PADDING: u8 = 0xBE;
const STREAM_ID_PRIVATE_2: u8 = 0xBF;
const STREAM_ID_ECM: u8 = 0xF0;
const STREAM_ID_EMM: u8 = 0xF1;
const STREAM_ID_DSMCC: u8 = 0xF2;
const STREAM_ID_H222_1_E: u8 = 0xF8;
const STREAM_ID_DIRECTORY: u8 = 0xFF;

fn has_optional_header(stream_id: u8) -> bool {
    !matches!(
        stream_id,
        STREAM_ID_PROGRAM_STREAM_MAP
            | STREAM_ID_PADDING
            | STREAM_ID_PRIVATE_2
            | STREAM_ID_ECM
            | STREAM_ID_EMM
            | STREAM_ID_DSMCC
            | STREAM_ID_H222_1_E
            | STREAM_ID_DIRECTORY
    )
}

/// 33-bit timestamp packed in 5 bytes with marker bits.
fn decode_timestamp(raw: &[u8]) -> Result<u64> {
    let bad = |_| DemuxError::invalid("truncated PES timestamp");
    let mut br = BitReader::endian(raw, BigEndian);
    br.skip(4).map_err(bad)?;
    let hi = br.read::<3, u64>().map_err(bad)?;
    br.skip(1).map_err(bad)?;
    let mid = br.read::<15, u64>().map_err(bad)?;
    br.skip(1).map_err(bad)?;
    let lo = br.read::<15, u64>().map_err(bad)?;
    Ok((hi << 30) | (mid << 15) | lo)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PesHeader {
    pub stream_id: u8,
    /// 0 means unbounded (video in TS).
    pub packet_length: u16,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    /// Offset of the elementary data inside the unit.
    pub data_offset: usize,
}

impl PesHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < PES_FIXED_HEADER {
            return Err(DemuxError::invalid(format!(
                "PES header truncated to {} bytes",
                data.len()
            )));
        }
        if data[..3] != PES_START_CODE {
            return Err(DemuxError::invalid("missing PES start code"));
        }
        let stream_id = data[3];
        let packet_length = u16::from_be_bytes([data[4], data[5]]);
        if !has_optional_header(stream_id) {
            return Ok(Self {
                stream_id,
                packet_length,
                pts: None,
                dts: None,
                data_offset: PES_FIXED_HEADER,
            });
        }

        if data.len() < PES_FIXED_HEADER + 3 {
            return Err(DemuxError::invalid("PES optional header truncated"));
        }
        let flags = data[7];
        let header_data_length = usize::from(data[8]);
        let data_offset = PES_FIXED_HEADER + 3 + header_data_length;
        if data.len() < data_offset {
            return Err(DemuxError::invalid(format!(
                "PES header data of {header_data_length} bytes truncated"
            )));
        }
        let opt = &data[PES_FIXED_HEADER + 3..data_offset];
        let (pts, dts) = match flags >> 6 {
            0b10 => (Some(decode_timestamp(opt)?), None),
            0b11 => (
                Some(decode_timestamp(opt)?),
                Some(decode_timestamp(opt.get(5..).unwrap_or_default())?),
            ),
            _ => (None, None),
        };
        Ok(Self {
            stream_id,
            packet_length,
            pts,
            dts,
            data_offset,
        })
    }

    /// Unit size in bytes when bounded.
    pub fn unit_size(&self) -> Option<usize> {
        (self.packet_length != 0).then(|| PES_FIXED_HEADER + usize::from(self.packet_length))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PesUnit {
    pub pid: u16,
    pub header: PesHeader,
    /// Elementary stream bytes after the PES header.
    #[serde(skip)]
    pub data: Bytes,
}

/// Per-PID PES gathering state.
#[derive(Debug, Default)]
pub struct PesAssembler {
    buffer: Vec<u8>,
    started: bool,
    units: u64,
    invalid_units: u64,
}

impl PesAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet payload. Completed units are appended to `out`.
    pub fn push(
        &mut self,
        pid: u16,
        unit_start: bool,
        payload: &[u8],
        out: &mut Vec<PesUnit>,
    ) -> Result<()> {
        if unit_start {
            self.finish(pid, out);
            self.started = true;
        } else if !self.started {
            return Ok(());
        }

        if self.buffer.capacity() - self.buffer.len() < payload.len() {
            let grow = self
                .buffer
                .capacity()
                .max(ACCUMULATOR_INITIAL_CAPACITY)
                .max(payload.len());
            self.buffer.try_reserve_exact(grow)?;
        }
        self.buffer.extend_from_slice(payload);

        // bounded units complete without waiting for the next start
        let bounded = PesHeader::parse(&self.buffer)
            .ok()
            .and_then(|h| h.unit_size());
        if let Some(size) = bounded {
            if self.buffer.len() >= size {
                self.buffer.truncate(size);
                self.finish(pid, out);
            }
        }
        Ok(())
    }

    /// Emit what has been gathered, if anything.
    pub fn finish(&mut self, pid: u16, out: &mut Vec<PesUnit>) {
        if !self.started || self.buffer.is_empty() {
            self.started = false;
            return;
        }
        self.started = false;
        match PesHeader::parse(&self.buffer) {
            Ok(header) => {
                self.units += 1;
                let end = header
                    .unit_size()
                    .map_or(self.buffer.len(), |n| n.min(self.buffer.len()));
                let data =
                    Bytes::copy_from_slice(&self.buffer[header.data_offset.min(end)..end]);
                out.push(PesUnit { pid, header, data });
            }
            Err(e) => {
                self.invalid_units += 1;
                warn!("PID 0x{pid:04X}: PES unit dropped: {e}");
            }
        }
        self.buffer.clear();
    }

    /// Drop the unit in progress; the next unit start resynchronizes.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.started = false;
    }

    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn invalid_units(&self) -> u64 {
        self.invalid_units
    }

    pub fn is_assembling(&self) -> bool {
        self.started
    }
}
