// psi/eit.rs
//! Event Information Table: present/following (0x4E, 0x4F) and
//! schedule (0x50..=0x6F).

use serde::Serialize;

use super::{RunningStatus, push_record};
use crate::config::ParseLimits;
use crate::error::Result;
use crate::psi::descriptor::DescriptorSet;
use crate::psi::section::SectionHead;
use crate::psi::time::{BcdDuration, UtcTime};
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Eit {
    pub service_id: u16,
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub segment_last_section_number: u8,
    pub last_table_id: u8,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub event_id: u16,
    pub start_time: Option<UtcTime>,
    pub duration: Option<BcdDuration>,
    pub running_status: RunningStatus,
    pub free_ca_mode: bool,
    pub descriptors: DescriptorSet,
}

impl Eit {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        self.service_id = head.id;
        if body.is_empty() {
            return Ok(());
        }
        let mut r = ByteReader::new(body);
        self.transport_stream_id = r.read_u16()?;
        self.original_network_id = r.read_u16()?;
        self.segment_last_section_number = r.read_u8()?;
        self.last_table_id = r.read_u8()?;

        while !r.is_empty() {
            let event_id = r.read_u16()?;
            let start_time = UtcTime::read(&mut r)?;
            let duration = BcdDuration::read(&mut r)?;
            let status = r.read_u8()?;
            let len_lo = r.read_u8()?;
            let len = (usize::from(status & 0x0F) << 8) | usize::from(len_lo);
            let mut descriptors = DescriptorSet::new();
            descriptors.read_all(&mut r.sub_reader(len)?, limits, head.table_id, false)?;
            push_record(
                &mut self.events,
                Event {
                    event_id,
                    start_time,
                    duration,
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_only() {
        let head = SectionHead::parse(&[0x4E, 0xF0, 0x09, 0x00, 0x65, 0xC1, 0x00, 0x00]).unwrap();
        let mut eit = Eit::default();
        eit.parse_section(&head, &[], &ParseLimits::default())
            .unwrap();
        assert_eq!(eit.service_id, 0x65);
        assert!(eit.events.is_empty());
    }

    #[test]
    fn test_event() {
        let head = SectionHead::parse(&[0x4E, 0xF0, 0x30, 0x00, 0x65, 0xC1, 0x00, 0x01]).unwrap();
        let body = [
            0x00, 0x01, 0x20, 0x85, 0x01, 0x4E, // ts, onid, segment_last, last_table_id
            0x12, 0x34, // event_id
            0xC0, 0x79, 0x12, 0x45, 0x00, // 1993-10-13 12:45:00
            0x01, 0x45, 0x00, // 1h45
            0x80, 0x00, // running, no descriptors
        ];
        let mut eit = Eit::default();
        eit.parse_section(&head, &body, &ParseLimits::default())
            .unwrap();
        assert_eq!(eit.service_id, 0x65);
        assert_eq!(eit.last_table_id, 0x4E);
        assert_eq!(eit.events.len(), 1);
        let ev = &eit.events[0];
        assert_eq!(ev.event_id, 0x1234);
        assert_eq!(ev.start_time.unwrap().ymd(), (1993, 10, 13));
        assert_eq!(ev.duration.unwrap().as_secs(), 6300);
        assert_eq!(ev.running_status, RunningStatus::Running);
    }

    #[test]
    fn test_undefined_start_time() {
        let head = SectionHead::parse(&[0x50, 0xF0, 0x30, 0x00, 0x65, 0xC1, 0x00, 0x00]).unwrap();
        let mut body = vec![0x00, 0x01, 0x20, 0x85, 0x00, 0x50, 0x00, 0x01];
        body.extend_from_slice(&[0xFF; 8]);
        body.extend_from_slice(&[0x00, 0x00]);
        let mut eit = Eit::default();
        eit.parse_section(&head, &body, &ParseLimits::default())
            .unwrap();
        assert!(eit.events[0].start_time.is_none());
        assert!(eit.events[0].duration.is_none());
    }
}
