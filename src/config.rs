//! Demultiplexer configuration.

use serde::{Deserialize, Serialize};

/// Tunables of a [`Demuxer`](crate::Demuxer).
///
/// Deserializable so the CLI can load it from a JSON file; missing keys take
/// their default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Retain decoded packets for diagnostics.
    pub store_parsed_packets: bool,
    /// Per-descriptor payload cap; longer descriptors are truncated.
    pub max_descriptor_data_bytes: u16,
    /// Cap on repeated records (programs, services, events, descriptors) per table.
    pub max_table_payload_records: u16,
    /// Upper bound on `last_section_number + 1`.
    pub max_sections_per_table: u16,
    pub initial_packet_history_capacity: u32,
    /// Check CRC-32/MPEG-2 of sections that carry one.
    pub verify_crc: bool,
    /// Run [`Demuxer::flush_all`](crate::Demuxer::flush_all) at the end of every buffer.
    pub flush_on_buffer_end: bool,
    /// Keep assembled PES units instead of only counting them.
    pub collect_pes: bool,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            store_parsed_packets: false,
            max_descriptor_data_bytes: 256,
            max_table_payload_records: 256,
            max_sections_per_table: 256,
            initial_packet_history_capacity: 1024,
            verify_crc: false,
            flush_on_buffer_end: true,
            collect_pes: false,
        }
    }
}

impl DemuxConfig {
    pub fn limits(&self) -> ParseLimits {
        ParseLimits {
            max_descriptor_data: usize::from(self.max_descriptor_data_bytes),
            max_records: usize::from(self.max_table_payload_records),
            max_sections: usize::from(self.max_sections_per_table),
        }
    }
}

/// Bounds applied by the table parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    pub max_descriptor_data: usize,
    pub max_records: usize,
    pub max_sections: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        DemuxConfig::default().limits()
    }
}
