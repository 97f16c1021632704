// psi/table.rs
//! Tables keyed by table id, with a typed payload per id.

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::config::ParseLimits;
use crate::constants::*;
use crate::error::Result;
use crate::psi::cat::DescriptorTable;
use crate::psi::dit::Dit;
use crate::psi::eit::Eit;
use crate::psi::nit::{Bat, Nit};
use crate::psi::pat::Pat;
use crate::psi::pmt::Pmt;
use crate::psi::rst::Rst;
use crate::psi::sdt::Sdt;
use crate::psi::section::SectionHead;
use crate::psi::sit::Sit;
use crate::psi::tdt::{Tdt, Tot};

/// Received section numbers of one table version (0..=255).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SectionBitmap([u64; 4]);

impl SectionBitmap {
    pub fn insert(&mut self, n: u8) {
        self.0[usize::from(n >> 6)] |= 1u64 << (n & 0x3F);
    }

    pub fn contains(&self, n: u8) -> bool {
        self.0[usize::from(n >> 6)] & (1u64 << (n & 0x3F)) != 0
    }

    /// True when every section in `0..=last` has been received.
    pub fn covers(&self, last: u8) -> bool {
        (0..=last).all(|n| self.contains(n))
    }

    pub fn count(&self) -> u32 {
        self.0.iter().map(|w| w.count_ones()).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|&n| self.contains(n))
    }
}

impl Serialize for SectionBitmap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.count() as usize))?;
        for n in self.iter() {
            seq.serialize_element(&n)?;
        }
        seq.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "payload")]
pub enum TableData {
    Pat(Pat),
    Cat(DescriptorTable),
    Pmt(Pmt),
    Tsdt(DescriptorTable),
    Metadata(DescriptorTable),
    Nit(Nit),
    Bat(Bat),
    Sdt(Sdt),
    Eit(Eit),
    Tdt(Tdt),
    Rst(Rst),
    Tot(Tot),
    Dit(Dit),
    Sit(Sit),
}

impl TableData {
    /// Empty payload for `table_id`, `None` when no parser exists for it.
    pub fn for_table_id(table_id: u8) -> Option<Self> {
        Some(match table_id {
            TID_PAT => TableData::Pat(Pat::default()),
            TID_CAT => TableData::Cat(DescriptorTable::default()),
            TID_PMT => TableData::Pmt(Pmt::default()),
            TID_TSDT => TableData::Tsdt(DescriptorTable::default()),
            TID_METADATA => TableData::Metadata(DescriptorTable::default()),
            TID_NIT_ACTUAL | TID_NIT_OTHER => TableData::Nit(Nit::default()),
            TID_BAT => TableData::Bat(Bat::default()),
            TID_SDT_ACTUAL | TID_SDT_OTHER => TableData::Sdt(Sdt::default()),
            TID_EIT_PF_ACTUAL | TID_EIT_PF_OTHER => TableData::Eit(Eit::default()),
            TID_EIT_SCHEDULE_FIRST..=TID_EIT_SCHEDULE_LAST => TableData::Eit(Eit::default()),
            TID_TDT => TableData::Tdt(Tdt::default()),
            TID_RST => TableData::Rst(Rst::default()),
            TID_TOT => TableData::Tot(Tot::default()),
            TID_DIT => TableData::Dit(Dit::default()),
            TID_SIT => TableData::Sit(Sit::default()),
            _ => return None,
        })
    }

    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        match self {
            TableData::Pat(t) => t.parse_section(head, body, limits),
            TableData::Cat(t) | TableData::Tsdt(t) | TableData::Metadata(t) => {
                t.parse_section(head, body, limits)
            }
            TableData::Pmt(t) => t.parse_section(head, body, limits),
            TableData::Nit(t) => t.parse_section(head, body, limits),
            TableData::Bat(t) => t.parse_section(head, body, limits),
            TableData::Sdt(t) => t.parse_section(head, body, limits),
            TableData::Eit(t) => t.parse_section(head, body, limits),
            TableData::Tdt(t) => t.parse_section(head, body),
            TableData::Rst(t) => t.parse_section(head, body, limits),
            TableData::Tot(t) => t.parse_section(head, body, limits),
            TableData::Dit(t) => t.parse_section(head, body),
            TableData::Sit(t) => t.parse_section(head, body, limits),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableData::Pat(_) => "PAT",
            TableData::Cat(_) => "CAT",
            TableData::Pmt(_) => "PMT",
            TableData::Tsdt(_) => "TSDT",
            TableData::Metadata(_) => "Metadata",
            TableData::Nit(_) => "NIT",
            TableData::Bat(_) => "BAT",
            TableData::Sdt(_) => "SDT",
            TableData::Eit(_) => "EIT",
            TableData::Tdt(_) => "TDT",
            TableData::Rst(_) => "RST",
            TableData::Tot(_) => "TOT",
            TableData::Dit(_) => "DIT",
            TableData::Sit(_) => "SIT",
        }
    }
}

/// One version of a table, complete or under construction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Table {
    pub table_id: u8,
    pub version_number: u8,
    /// Head of the most recent section added.
    pub head: SectionHead,
    pub sections: SectionBitmap,
    pub data: TableData,
}

impl Table {
    pub fn new(head: &SectionHead) -> Option<Self> {
        Some(Self {
            table_id: head.table_id,
            version_number: head.version_number,
            head: *head,
            sections: SectionBitmap::default(),
            data: TableData::for_table_id(head.table_id)?,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.sections.covers(self.head.last_section_number)
    }

    pub fn name(&self) -> &'static str {
        self.data.name()
    }

    pub fn as_pat(&self) -> Option<&Pat> {
        match &self.data {
            TableData::Pat(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pmt(&self) -> Option<&Pmt> {
        match &self.data {
            TableData::Pmt(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_sdt(&self) -> Option<&Sdt> {
        match &self.data {
            TableData::Sdt(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nit(&self) -> Option<&Nit> {
        match &self.data {
            TableData::Nit(n) => Some(n),
            _ => None,
        }
    }
}
