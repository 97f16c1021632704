// psi/rst.rs
//! Running Status Table (0x71).

use serde::Serialize;

use super::{RunningStatus, push_record};
use crate::config::ParseLimits;
use crate::error::{DemuxError, Result};
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

const RST_ENTRY_SIZE: usize = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rst {
    pub entries: Vec<RunningStatusEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunningStatusEntry {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub service_id: u16,
    pub event_id: u16,
    pub running_status: RunningStatus,
}

impl Rst {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        if body.len() % RST_ENTRY_SIZE != 0 {
            return Err(DemuxError::invalid(format!(
                "RST body of {} bytes is not a whole number of entries",
                body.len()
            )));
        }
        let mut r = ByteReader::new(body);
        while !r.is_empty() {
            let entry = RunningStatusEntry {
                transport_stream_id: r.read_u16()?,
                original_network_id: r.read_u16()?,
                service_id: r.read_u16()?,
                event_id: r.read_u16()?,
                running_status: RunningStatus::from_bits(r.read_u8()?),
            };
            push_record(&mut self.entries, entry, limits, head.table_id)?;
        }
        Ok(())
    }
}
