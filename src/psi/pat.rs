// psi/pat.rs
//! Program Association Table (table_id 0x00).

use serde::Serialize;

use super::push_record;
use crate::config::ParseLimits;
use crate::error::{DemuxError, Result};
use crate::psi::section::SectionHead;
use crate::reader::ByteReader;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pat {
    pub transport_stream_id: u16,
    /// PID carried by program_number 0.
    pub network_pid: Option<u16>,
    /// Entries in wire order, program 0 included.
    pub programs: Vec<PatProgram>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatProgram {
    pub program_number: u16,
    pub pid: u16,
}

impl Pat {
    pub fn parse_section(
        &mut self,
        head: &SectionHead,
        body: &[u8],
        limits: &ParseLimits,
    ) -> Result<()> {
        if body.len() % 4 != 0 {
            return Err(DemuxError::invalid(format!(
                "PAT body of {} bytes is not a whole number of entries",
                body.len()
            )));
        }
        self.transport_stream_id = head.id;
        let mut r = ByteReader::new(body);
        while !r.is_empty() {
            let program_number = r.read_u16()?;
            let pid = r.read_pid()?;
            if program_number == 0 {
                self.network_pid = Some(pid);
            }
            push_record(
                &mut self.programs,
                PatProgram {
                    program_number,
                    pid,
                },
                limits,
                head.table_id,
            )?;
        }
        Ok(())
    }

    /// PMT PIDs, skipping the network entry.
    pub fn pmt_pids(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.programs
            .iter()
            .filter(|p| p.program_number != 0)
            .map(|p| (p.program_number, p.pid))
    }
}
