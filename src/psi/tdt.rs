// psi/tdt.rs
//! TDT (0x70, no CRC) and TOT (0x73, CRC present).

use serde::Serialize;

use crate::config::ParseLimits;
use crate::error::Result;
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::psi::time::UtcTime;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tdt {
    pub utc_time: Option<UtcTime>,
}

impl Tdt {
    pub fn parse_section(&mut self, _head: &SectionHead, body: &[u8]) -> Result<()> {
        if body.is_empty() {
            return Ok(());
        }
        self.utc_time = UtcTime::read(&mut ByteReader::new(body))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tot {
    pub utc_time: Option<UtcTime>,
    /// Usually local_time_offset_descriptors.
    pub descriptors: DescriptorSet,
}

impl Tot {
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
        self.utc_time = UtcTime::read(&mut r)?;
        self.descriptors
            .read_loop(&mut r, limits, head.table_id, false)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tdt() {
        let head = SectionHead::parse(&[0x70, 0x70, 0x05]).unwrap();
        let mut tdt = Tdt::default();
        tdt.parse_section(&head, &[0xC0, 0x79, 0x12, 0x45, 0x00])
            .unwrap();
        assert_eq!(tdt.utc_time.unwrap().hour, 12);
    }

    #[test]
    fn test_tot() {
        let head = SectionHead::parse(&[0x73, 0x70, 0x14]).unwrap();
        let body = [
            0xC0, 0x79, 0x12, 0x45, 0x00, 0xF0, 0x0F, 0x58, 0x0D, b'G', b'B', b'R', 0x02, 0x00,
            0x00, 0xC0, 0x79, 0x01, 0x00, 0x00, 0x01, 0x00,
        ];
        let mut tot = Tot::default();
        tot.parse_section(&head, &body, &ParseLimits::default())
            .unwrap();
        assert!(tot.utc_time.is_some());
        assert_eq!(tot.descriptors.find(0x58).unwrap().length, 13);
    }

    #[test]
    fn test_short_tdt() {
        let head = SectionHead::parse(&[0x70, 0x70, 0x03]).unwrap();
        assert!(Tdt::default()
            .parse_section(&head, &[0xC0, 0x79, 0x12])
            .is_err());
    }
}
