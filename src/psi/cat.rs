// psi/cat.rs
//! Descriptor-only tables: CAT (0x01), TSDT (0x03) and metadata (0x06).

use serde::Serialize;

use crate::config::ParseLimits;
use crate::error::Result;
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

/// Body is a bare descriptor loop filling the section; sections append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DescriptorTable {
    pub descriptors: DescriptorSet,
}

impl DescriptorTable {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        self.descriptors
            .read_all(&mut ByteReader::new(body), limits, head.table_id, true)
    }
}
