// psi/nit.rs
//! Network Information Table (0x40 actual, 0x41 other) and the
//! Bouquet Association Table (0x4A), which shares its layout.

use serde::Serialize;

use super::push_record;
use crate::config::ParseLimits;
use crate::error::{DemuxError, Result};
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Nit {
    pub network_id: u16,
    pub descriptors: DescriptorSet,
    pub transport_streams: Vec<TransportStream>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bat {
    pub bouquet_id: u16,
    pub descriptors: DescriptorSet,
    pub transport_streams: Vec<TransportStream>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportStream {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub descriptors: DescriptorSet,
}

/// First-level descriptors, then the transport stream loop.
fn parse_loops(
    descriptors: &mut DescriptorSet,
    transport_streams: &mut Vec<TransportStream>,
    head: &SectionHead,
    body: &[u8],
    limits: &ParseLimits,
) -> Result<()> {
    if body.is_empty() {
        return Ok(());
    }
    let mut r = ByteReader::new(body);
    descriptors.read_loop(&mut r, limits, head.table_id, true)?;

    let loop_len = r.read_length12()?;
    let mut ts_loop = r.sub_reader(loop_len).map_err(|_| {
        DemuxError::invalid(format!(
            "transport stream loop of {loop_len} bytes overruns table 0x{:02X}",
            head.table_id
        ))
    })?;
    while !ts_loop.is_empty() {
        let transport_stream_id = ts_loop.read_u16()?;
        let original_network_id = ts_loop.read_u16()?;
        let mut descriptors = DescriptorSet::new();
        descriptors.read_loop(&mut ts_loop, limits, head.table_id, false)?;
        push_record(
            transport_streams,
            TransportStream {
                transport_stream_id,
                original_network_id,
                descriptors,
            },
            limits,
            head.table_id,
        )?;
    }
    Ok(())
}

impl Nit {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        self.network_id = head.id;
        parse_loops(
            &mut self.descriptors,
            &mut self.transport_streams,
            head,
            body,
            limits,
        )
    }
}

impl Bat {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        self.bouquet_id = head.id;
        parse_loops(
            &mut self.descriptors,
            &mut self.transport_streams,
            head,
            body,
            limits,
        )
    }
}
