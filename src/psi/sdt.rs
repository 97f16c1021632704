// psi/sdt.rs
//! Service Description Table (0x42 actual, 0x46 other).

use serde::Serialize;

use super::{RunningStatus, push_record};
use crate::config::ParseLimits;
use crate::error::Result;
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sdt {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub services: Vec<SdtService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SdtService {
    pub service_id: u16,
    pub eit_schedule_flag: bool,
    pub eit_present_following_flag: bool,
    pub running_status: RunningStatus,
    pub free_ca_mode: bool,
    pub descriptors: DescriptorSet,
}

impl Sdt {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        self.transport_stream_id = head.id;
        // head-only section
        if body.is_empty() {
            return Ok(());
        }
        let mut r = ByteReader::new(body);
        self.original_network_id = r.read_u16()?;
        r.skip(1)?; // reserved_future_use

        while !r.is_empty() {
            let service_id = r.read_u16()?;
            let flags = r.read_u8()?;
            // running_status and free_CA_mode share the byte with the length's top nibble
            let status = r.read_u8()?;
            let len_lo = r.read_u8()?;
            let len = (usize::from(status & 0x0F) << 8) | usize::from(len_lo);
            let mut descriptors = DescriptorSet::new();
            descriptors.read_all(&mut r.sub_reader(len)?, limits, head.table_id, false)?;
            push_record(
                &mut self.services,
                SdtService {
                    service_id,
                    eit_schedule_flag: flags & 0x02 != 0,
                    eit_present_following_flag: flags & 0x01 != 0,
                    running_status: RunningStatus::from_bits(status >> 5),
                    free_ca_mode: status & 0x10 != 0,
                    descriptors,
                },
                limits,
                head.table_id,
            )?;
        }
        Ok(())
    }

    pub fn service(&self, service_id: u16) -> Option<&SdtService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services() {
        let head = SectionHead::parse(&[0x42, 0xF0, 0x20, 0x00, 0x01, 0xC1, 0x00, 0x00]).unwrap();
        let body = [
            0x20, 0x85, 0xFF, // original_network_id, reserved
            0x00, 0x01, 0xFD, 0x80, 0x05, // service 1: running, scrambled=0
            0x48, 0x03, 0x01, 0x00, 0x00,
            0x00, 0x02, 0xFE, 0x30, 0x00, // service 2: not running, free CA
        ];
        let mut sdt = Sdt::default();
        sdt.parse_section(&head, &body, &ParseLimits::default())
            .unwrap();
        assert_eq!(sdt.original_network_id, 0x2085);
        assert_eq!(sdt.services.len(), 2);

        let s1 = sdt.service(1).unwrap();
        assert_eq!(s1.running_status, RunningStatus::Running);
        assert!(!s1.eit_schedule_flag);
        assert!(s1.eit_present_following_flag);
        assert!(!s1.free_ca_mode);
        assert!(s1.descriptors.find(0x48).is_some());

        let s2 = sdt.service(2).unwrap();
        assert_eq!(s2.running_status, RunningStatus::NotRunning);
        assert!(s2.eit_schedule_flag);
        assert!(s2.free_ca_mode);
    }

    #[test]
    fn test_descriptor_overrun() {
        let head = SectionHead::parse(&[0x42, 0xF0, 0x20, 0x00, 0x01, 0xC1, 0x00, 0x00]).unwrap();
        let body = [0x20, 0x85, 0xFF, 0x00, 0x01, 0xFD, 0x80, 0x09, 0x48, 0x00];
        assert!(Sdt::default()
            .parse_section(&head, &body, &ParseLimits::default())
            .is_err());
    }
}
