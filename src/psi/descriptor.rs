// psi/descriptor.rs
//! Tag/length/value descriptor loops.

use bytes::Bytes;
use serde::Serialize;

use crate::config::ParseLimits;
use crate::constants::DESCRIPTOR_SET_INITIAL_CAPACITY;
use crate::error::{DemuxError, Result};
use crate::reader::ByteReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub tag: u8,
    /// Length as declared on the wire. `data` may be shorter when capped.
    pub length: u8,
    pub data: Bytes,
}

impl Descriptor {
    pub fn is_truncated(&self) -> bool {
        self.data.len() < usize::from(self.length)
    }
}

/// Ordered descriptors; position matters for some tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DescriptorSet {
    descriptors: Vec<Descriptor>,
}

impl DescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a loop announced by a 12-bit `descriptors_length` prefix.
    ///
    /// Appends when `additive`, otherwise replaces the current content.
    /// Returns the number of descriptor bytes consumed.
    pub fn read_loop(
        &mut self,
        r: &mut ByteReader<'_>,
        limits: &ParseLimits,
        table_id: u8,
        additive: bool,
    ) -> Result<usize> {
        let len = r.read_length12()?;
        let mut body = r.sub_reader(len).map_err(|_| {
            DemuxError::invalid(format!(
                "descriptor loop of {len} bytes overruns table 0x{table_id:02X}"
            ))
        })?;
        self.read_all(&mut body, limits, table_id, additive)?;
        Ok(len)
    }

    /// Read descriptors until `r` is drained (loops without a length prefix).
    pub fn read_all(
        &mut self,
        r: &mut ByteReader<'_>,
        limits: &ParseLimits,
        table_id: u8,
        additive: bool,
    ) -> Result<()> {
        if !additive {
            self.descriptors.clear();
        }
        while !r.is_empty() {
            let tag = r.read_u8()?;
            let length = r.read_u8()?;
            let raw = r.read_bytes(usize::from(length)).map_err(|_| {
                DemuxError::invalid(format!(
                    "descriptor 0x{tag:02X} of {length} bytes truncated in table 0x{table_id:02X}"
                ))
            })?;
            let kept = raw.len().min(limits.max_descriptor_data);
            self.push(
                Descriptor {
                    tag,
                    length,
                    data: Bytes::copy_from_slice(&raw[..kept]),
                },
                limits,
                table_id,
            )?;
        }
        Ok(())
    }

    fn push(&mut self, d: Descriptor, limits: &ParseLimits, table_id: u8) -> Result<()> {
        if self.descriptors.len() >= limits.max_records {
            return Err(DemuxError::TableFull {
                table_id,
                limit: limits.max_records,
            });
        }
        if self.descriptors.len() == self.descriptors.capacity() {
            let grow = self
                .descriptors
                .capacity()
                .max(DESCRIPTOR_SET_INITIAL_CAPACITY);
            self.descriptors.try_reserve_exact(grow)?;
        }
        self.descriptors.push(d);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// First descriptor carrying `tag`.
    pub fn find(&self, tag: u8) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.tag == tag)
    }

    /// Sum of `2 + length` over all descriptors, as declared on the wire.
    pub fn wire_length(&self) -> usize {
        self.descriptors
            .iter()
            .map(|d| 2 + usize::from(d.length))
            .sum()
    }
}

impl<'a> IntoIterator for &'a DescriptorSet {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}
