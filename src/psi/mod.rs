pub mod cat;
pub mod descriptor;
pub mod dit;
pub mod eit;
pub mod nit;
pub mod pat;
pub mod pmt;
pub mod rst;
pub mod sdt;
pub mod section;
pub mod sit;
pub mod store;
pub mod table;
pub mod tdt;
pub mod time;

pub use cat::DescriptorTable;
pub use descriptor::{Descriptor, DescriptorSet};
pub use dit::Dit;
pub use eit::{Eit, Event};
pub use nit::{Bat, Nit, TransportStream};
pub use pat::{Pat, PatProgram};
pub use pmt::{Pmt, PmtStream};
pub use rst::{Rst, RunningStatusEntry};
pub use sdt::{Sdt, SdtService};
pub use section::{Section, SectionHead};
pub use sit::{Sit, SitService};
pub use store::{SectionOutcome, TableStore};
pub use table::{SectionBitmap, Table, TableData};
pub use tdt::{Tdt, Tot};
pub use time::{BcdDuration, UtcTime};

use serde::Serialize;

use crate::config::ParseLimits;
use crate::error::{DemuxError, Result};

/// running_status of SDT, EIT, RST and SIT entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunningStatus {
    Undefined,
    NotRunning,
    StartsSoon,
    Pausing,
    Running,
    OffAir,
    Reserved(u8),
}

impl RunningStatus {
    /// Decode the low three bits of `n`.
    pub fn from_bits(n: u8) -> Self {
        match n & 0x07 {
            0 => RunningStatus::Undefined,
            1 => RunningStatus::NotRunning,
            2 => RunningStatus::StartsSoon,
            3 => RunningStatus::Pausing,
            4 => RunningStatus::Running,
            5 => RunningStatus::OffAir,
            other => RunningStatus::Reserved(other),
        }
    }
}

/// Append a repeated record, enforcing the per-table cap.
pub(crate) fn push_record<T>(
    records: &mut Vec<T>,
    item: T,
    limits: &ParseLimits,
    table_id: u8,
) -> Result<()> {
    if records.len() >= limits.max_records {
        return Err(DemuxError::TableFull {
            table_id,
            limit: limits.max_records,
        });
    }
    records.try_reserve(1)?;
    records.push(item);
    Ok(())
}
