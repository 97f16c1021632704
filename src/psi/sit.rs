// psi/sit.rs
//! Selection Information Table (0x7F), found in partial transport streams.

use serde::Serialize;

use super::{RunningStatus, push_record};
use crate::config::ParseLimits;
use crate::error::Result;
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sit {
    pub transmission_info: DescriptorSet,
    pub services: Vec<SitService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitService {
    pub service_id: u16,
    pub running_status: RunningStatus,
    pub descriptors: DescriptorSet,
}

impl Sit {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        if body.is_empty() {
            return Ok(());
        }
        let mut r = ByteReader::new(body);
        self.transmission_info
            .read_loop(&mut r, limits, head.table_id, true)?;

        while !r.is_empty() {
            let service_id = r.read_u16()?;
            let word = r.read_u16()?;
            let len = usize::from(word & 0x0FFF);
            let mut descriptors = DescriptorSet::new();
            descriptors.read_all(&mut r.sub_reader(len)?, limits, head.table_id, false)?;
            push_record(
                &mut self.services,
                SitService {
                    service_id,
                    running_status: RunningStatus::from_bits((word >> 12) as u8),
                    descriptors,
                },
                limits,
                head.table_id,
            )?;
        }
        Ok(())
    }
}
