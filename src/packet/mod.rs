//! Transport stream packet header (ISO/IEC 13818-1 2.4.3.2).

mod adaptation;

pub use adaptation::{
    AdaptationExtension, AdaptationField, ClockReference, LegalTimeWindow, SeamlessSplice,
};

use bytes::{BufMut, Bytes};
use serde::Serialize;

use crate::constants::{TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::error::{DemuxError, Result};

/// Transport scrambling control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScramblingControl {
    NotScrambled,
    Reserved,
    EvenKey,
    OddKey,
}

impl ScramblingControl {
    pub fn from_bits(n: u8) -> Self {
        match n & 0x03 {
            0b00 => ScramblingControl::NotScrambled,
            0b01 => ScramblingControl::Reserved,
            0b10 => ScramblingControl::EvenKey,
            _ => ScramblingControl::OddKey,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            ScramblingControl::NotScrambled => 0b00,
            ScramblingControl::Reserved => 0b01,
            ScramblingControl::EvenKey => 0b10,
            ScramblingControl::OddKey => 0b11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AdaptationFieldControl {
    Reserved,
    PayloadOnly,
    AdaptationOnly,
    AdaptationAndPayload,
}

impl AdaptationFieldControl {
    pub fn from_bits(n: u8) -> Self {
        match n & 0x03 {
            0b00 => AdaptationFieldControl::Reserved,
            0b01 => AdaptationFieldControl::PayloadOnly,
            0b10 => AdaptationFieldControl::AdaptationOnly,
            _ => AdaptationFieldControl::AdaptationAndPayload,
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            AdaptationFieldControl::Reserved => 0b00,
            AdaptationFieldControl::PayloadOnly => 0b01,
            AdaptationFieldControl::AdaptationOnly => 0b10,
            AdaptationFieldControl::AdaptationAndPayload => 0b11,
        }
    }

    pub fn has_adaptation_field(&self) -> bool {
        matches!(
            self,
            AdaptationFieldControl::AdaptationOnly | AdaptationFieldControl::AdaptationAndPayload
        )
    }

    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            AdaptationFieldControl::PayloadOnly | AdaptationFieldControl::AdaptationAndPayload
        )
    }
}

/// One decoded 188-byte packet. The payload is copied out of the caller's buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Packet {
    pub transport_error_indicator: bool,
    pub payload_unit_start_indicator: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: ScramblingControl,
    pub adaptation_field_control: AdaptationFieldControl,
    pub continuity_counter: u8,
    pub adaptation_field: Option<AdaptationField>,
    pub payload: Bytes,
}

impl Packet {
    /// Parse the first 188 bytes of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(DemuxError::InvalidArgument("empty packet buffer"));
        }
        if data[0] != TS_SYNC_BYTE {
            return Err(DemuxError::invalid(format!(
                "sync byte 0x{:02X} instead of 0x47",
                data[0]
            )));
        }
        if data.len() < TS_PACKET_SIZE {
            return Err(DemuxError::invalid(format!(
                "packet truncated to {} bytes",
                data.len()
            )));
        }
        let data = &data[..TS_PACKET_SIZE];

        let transport_error_indicator = data[1] & 0x80 != 0;
        let payload_unit_start_indicator = data[1] & 0x40 != 0;
        let transport_priority = data[1] & 0x20 != 0;
        let pid = (u16::from(data[1] & 0x1F) << 8) | u16::from(data[2]);
        let scrambling_control = ScramblingControl::from_bits(data[3] >> 6);
        let adaptation_field_control = AdaptationFieldControl::from_bits(data[3] >> 4);
        let continuity_counter = data[3] & 0x0F;

        let mut offset = TS_HEADER_SIZE;
        let mut adaptation_field = None;
        if adaptation_field_control.has_adaptation_field() {
            let len = usize::from(data[offset]);
            offset += 1;
            if offset + len > TS_PACKET_SIZE {
                return Err(DemuxError::invalid(format!(
                    "adaptation field length {len} overruns packet"
                )));
            }
            adaptation_field = Some(AdaptationField::parse(&data[offset..offset + len])?);
            offset += len;
        }

        let payload = if adaptation_field_control.has_payload() {
            Bytes::copy_from_slice(&data[offset..])
        } else {
            Bytes::new()
        };

        Ok(Self {
            transport_error_indicator,
            payload_unit_start_indicator,
            transport_priority,
            pid,
            scrambling_control,
            adaptation_field_control,
            continuity_counter,
            adaptation_field,
            payload,
        })
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control.has_payload()
    }

    pub fn adaptation_field_length(&self) -> usize {
        self.adaptation_field
            .as_ref()
            .map_or(0, |af| usize::from(af.length))
    }

    /// Write the packet back to its 188-byte wire form.
    ///
    /// Space not covered by header, adaptation field and payload is filled
    /// with 0xFF.
    pub fn encode(&self) -> Result<Bytes> {
        let mut out = Vec::with_capacity(TS_PACKET_SIZE);
        out.put_u8(TS_SYNC_BYTE);
        out.put_u16(
            (u16::from(self.transport_error_indicator) << 15)
                | (u16::from(self.payload_unit_start_indicator) << 14)
                | (u16::from(self.transport_priority) << 13)
                | (self.pid & 0x1FFF),
        );
        out.put_u8(
            (self.scrambling_control.bits() << 6)
                | (self.adaptation_field_control.bits() << 4)
                | (self.continuity_counter & 0x0F),
        );
        if let Some(af) = &self.adaptation_field {
            af.encode(&mut out);
        }
        out.put_slice(&self.payload);
        if out.len() > TS_PACKET_SIZE {
            return Err(DemuxError::InvalidArgument(
                "packet fields exceed 188 bytes",
            ));
        }
        out.resize(TS_PACKET_SIZE, 0xFF);
        Ok(Bytes::from(out))
    }
}
