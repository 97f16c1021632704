// psi/pmt.rs
//! Program Map Table (table_id 0x02).

use serde::Serialize;

use super::push_record;
use crate::config::ParseLimits;
use crate::error::Result;
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pmt {
    pub program_number: u16,
    pub pcr_pid: u16,
    pub descriptors: DescriptorSet,
    pub streams: Vec<PmtStream>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PmtStream {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: DescriptorSet,
}

impl Pmt {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        self.program_number = head.id;
        if body.is_empty() {
            return Ok(());
        }
        let mut r = ByteReader::new(body);
        self.pcr_pid = r.read_pid()?;
        self.descriptors
            .read_loop(&mut r, limits, head.table_id, true)?;

        while !r.is_empty() {
            let stream_type = r.read_u8()?;
            let elementary_pid = r.read_pid()?;
            let mut descriptors = DescriptorSet::new();
            descriptors.read_loop(&mut r, limits, head.table_id, false)?;
            push_record(
                &mut self.streams,
                PmtStream {
                    stream_type,
                    elementary_pid,
                    descriptors,
                },
                limits,
                head.table_id,
            )?;
        }
        Ok(())
    }
}
