// psi/section.rs
//! Section head decoding and CRC-32 (MPEG-2) verification.

use bytes::Bytes;
use crc::{CRC_32_MPEG_2, Crc};
use serde::Serialize;

use crate::constants::{
    LONG_SECTION_HEAD_SIZE, MAX_SECTION_LENGTH, MIN_LONG_SECTION_LENGTH, SECTION_CRC_SIZE,
    SHORT_SECTION_HEAD_SIZE, TID_TOT,
};
use crate::error::{DemuxError, Result};

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Common PSI/SI section header.
///
/// Short-form sections (section_syntax_indicator == 0) have only the first
/// three bytes; they decode as version 0, current, section 0 of 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SectionHead {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub section_length: u16,
    /// transport_stream_id, program_number, service_id, ... depending on the table
    pub id: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

impl SectionHead {
    /// Bytes the head occupies, known once the first two bytes are buffered.
    pub fn size_for(data: &[u8]) -> Option<usize> {
        let b1 = *data.get(1)?;
        Some(if b1 & 0x80 != 0 {
            LONG_SECTION_HEAD_SIZE
        } else {
            SHORT_SECTION_HEAD_SIZE
        })
    }

    /// Whether the declared section_length is usable. Illegal lengths make the
    /// section undecodable, so it is dropped rather than reported.
    pub fn length_is_legal(data: &[u8]) -> bool {
        let (Some(&b1), Some(&b2)) = (data.get(1), data.get(2)) else {
            return false;
        };
        let len = (u16::from(b1 & 0x0F) << 8) | u16::from(b2);
        let min = if b1 & 0x80 != 0 {
            MIN_LONG_SECTION_LENGTH
        } else {
            0
        };
        (min..=MAX_SECTION_LENGTH).contains(&len)
    }

    /// Decode the head at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let size = Self::size_for(data)
            .ok_or_else(|| DemuxError::invalid("section head truncated"))?;
        if data.len() < size {
            return Err(DemuxError::invalid(format!(
                "section head needs {size} bytes, {} buffered",
                data.len()
            )));
        }

        let table_id = data[0];
        let section_syntax_indicator = data[1] & 0x80 != 0;
        let section_length = (u16::from(data[1] & 0x0F) << 8) | u16::from(data[2]);
        if section_length > MAX_SECTION_LENGTH {
            return Err(DemuxError::invalid(format!(
                "section_length {section_length} above {MAX_SECTION_LENGTH}"
            )));
        }

        if !section_syntax_indicator {
            return Ok(Self {
                table_id,
                section_syntax_indicator,
                section_length,
                id: 0,
                version_number: 0,
                current_next_indicator: true,
                section_number: 0,
                last_section_number: 0,
            });
        }

        if section_length < MIN_LONG_SECTION_LENGTH {
            return Err(DemuxError::invalid(format!(
                "section_length {section_length} shorter than the long head"
            )));
        }
        let section_number = data[6];
        let last_section_number = data[7];
        if section_number > last_section_number {
            return Err(DemuxError::invalid(format!(
                "section_number {section_number} above last_section_number {last_section_number}"
            )));
        }

        Ok(Self {
            table_id,
            section_syntax_indicator,
            section_length,
            id: (u16::from(data[3]) << 8) | u16::from(data[4]),
            version_number: (data[5] >> 1) & 0x1F,
            current_next_indicator: data[5] & 0x01 != 0,
            section_number,
            last_section_number,
        })
    }

    pub fn head_size(&self) -> usize {
        if self.section_syntax_indicator {
            LONG_SECTION_HEAD_SIZE
        } else {
            SHORT_SECTION_HEAD_SIZE
        }
    }

    /// Bytes following the head: `section_length - 5` for long form,
    /// `section_length` for short form. Includes the CRC where present.
    pub fn expected_payload_size(&self) -> usize {
        let len = usize::from(self.section_length);
        if self.section_syntax_indicator {
            len - (LONG_SECTION_HEAD_SIZE - SHORT_SECTION_HEAD_SIZE)
        } else {
            len
        }
    }

    pub fn total_size(&self) -> usize {
        SHORT_SECTION_HEAD_SIZE + usize::from(self.section_length)
    }

    /// Long-form sections and TOT end in a CRC_32.
    pub fn has_crc(&self) -> bool {
        self.section_syntax_indicator || self.table_id == TID_TOT
    }
}

/// One complete section: head plus raw bytes (head and CRC included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub head: SectionHead,
    pub bytes: Bytes,
}

impl Section {
    pub fn new(head: SectionHead, bytes: Bytes) -> Self {
        Self { head, bytes }
    }

    /// The table payload, without head and CRC.
    pub fn body(&self) -> &[u8] {
        let start = self.head.head_size().min(self.bytes.len());
        let end = if self.head.has_crc() {
            self.bytes.len().saturating_sub(SECTION_CRC_SIZE)
        } else {
            self.bytes.len()
        };
        &self.bytes[start..end.max(start)]
    }

    pub fn crc(&self) -> Option<u32> {
        if !self.head.has_crc() || self.bytes.len() < SECTION_CRC_SIZE {
            return None;
        }
        let tail = &self.bytes[self.bytes.len() - SECTION_CRC_SIZE..];
        Some(u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]))
    }

    /// Check the trailing CRC_32 against the head and payload.
    pub fn verify_crc(&self) -> Result<()> {
        let Some(expected) = self.crc() else {
            return Ok(());
        };
        let calc = CRC_MPEG.checksum(&self.bytes[..self.bytes.len() - SECTION_CRC_SIZE]);
        if calc != expected {
            return Err(DemuxError::invalid(format!(
                "CRC-32 mismatch on table 0x{:02X}: 0x{calc:08X} != 0x{expected:08X}",
                self.head.table_id
            )));
        }
        Ok(())
    }
}

/// CRC-32/MPEG-2 of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    CRC_MPEG.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    // PAT, one program (1 -> 0x0020)
    const PAT: [u8; 16] = [
        0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xE0, 0x20, 0, 0, 0, 0,
    ];

    fn pat_with_crc() -> Vec<u8> {
        let mut data = PAT.to_vec();
        let crc = crc32(&data[..12]);
        data[12..].copy_from_slice(&crc.to_be_bytes());
        data
    }

    #[test]
    fn test_long_head() {
        let head = SectionHead::parse(&PAT).unwrap();
        assert_eq!(head.table_id, 0x00);
        assert!(head.section_syntax_indicator);
        assert_eq!(head.section_length, 13);
        assert_eq!(head.id, 1);
        assert_eq!(head.version_number, 0);
        assert!(head.current_next_indicator);
        assert_eq!(head.section_number, 0);
        assert_eq!(head.last_section_number, 0);
        assert_eq!(head.expected_payload_size(), 8);
        assert_eq!(head.total_size(), 16);
    }

    #[test]
    fn test_short_head() {
        let head = SectionHead::parse(&[0x70, 0x70, 0x05]).unwrap();
        assert!(!head.section_syntax_indicator);
        assert_eq!(head.expected_payload_size(), 5);
        assert!(!head.has_crc());
        let tot = SectionHead::parse(&[0x73, 0x70, 0x0B]).unwrap();
        assert!(tot.has_crc());
    }

    #[test]
    fn test_bad_lengths() {
        assert!(SectionHead::parse(&[0x00, 0xB4, 0x00, 0, 0, 0, 0, 0]).is_err());
        assert!(SectionHead::parse(&[0x00, 0xB0, 0x04, 0, 0, 0, 0, 0]).is_err());
        assert!(!SectionHead::length_is_legal(&[0x00, 0xB0, 0x04]));
        assert!(SectionHead::length_is_legal(&[0x70, 0x70, 0x05]));
        // section 2 of 1
        assert!(SectionHead::parse(&[0x00, 0xB0, 0x05, 0, 0, 0xC1, 2, 1]).is_err());
    }

    #[test]
    fn test_minimum_length_has_empty_body() {
        let data = [0x02, 0xB0, 0x05, 0x00, 0x01, 0xC1, 0x00, 0x00];
        let head = SectionHead::parse(&data).unwrap();
        assert_eq!(head.expected_payload_size(), 0);
        let section = Section::new(head, Bytes::copy_from_slice(&data));
        assert!(section.body().is_empty());
    }

    #[test]
    fn test_body_skips_crc() {
        let data = pat_with_crc();
        let head = SectionHead::parse(&data).unwrap();
        let section = Section::new(head, Bytes::from(data));
        assert_eq!(section.body(), &[0x00, 0x01, 0xE0, 0x20]);
        section.verify_crc().unwrap();
    }

    #[test]
    fn test_crc_mismatch() {
        let mut data = pat_with_crc();
        data[15] ^= 0x01;
        let head = SectionHead::parse(&data).unwrap();
        let section = Section::new(head, Bytes::from(data));
        assert!(section.verify_crc().is_err());
    }
}
