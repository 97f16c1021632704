// psi/store.rs
//! Partial and completed tables, one slot pair per table id.

use log::{debug, trace, warn};

use crate::config::ParseLimits;
use crate::error::{DemuxError, Result};
use crate::psi::section::Section;
use crate::psi::table::Table;

/// What [`TableStore::add_section`] did with a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionOutcome {
    /// Stored; the table still misses sections.
    Added,
    /// The table became complete and replaced the previous one.
    Promoted,
    NotCurrent,
    /// The completed table already holds this version.
    SameVersion,
    /// Section number already received for this version.
    Duplicate,
    /// No parser for this table id.
    Unsupported,
}

pub struct TableStore {
    partial: Vec<Option<Table>>,
    completed: Vec<Option<Table>>,
    epoch_resets: u64,
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore {
    pub fn new() -> Self {
        Self {
            partial: vec![None; 256],
            completed: vec![None; 256],
            epoch_resets: 0,
        }
    }

    pub fn add_section(&mut self, section: &Section, limits: &ParseLimits) -> Result<SectionOutcome> {
        let head = &section.head;
        let tid = usize::from(head.table_id);

        if !head.current_next_indicator {
            trace!("table 0x{:02X}: next-indicator section skipped", head.table_id);
            return Ok(SectionOutcome::NotCurrent);
        }

        // Short-form sections are whole tables and always replace the last one.
        if !head.section_syntax_indicator {
            let Some(mut table) = Table::new(head) else {
                debug!("table 0x{:02X}: no parser, ignored", head.table_id);
                return Ok(SectionOutcome::Unsupported);
            };
            table.sections.insert(0);
            table.data.parse_section(head, section.body(), limits)?;
            debug!("table 0x{:02X} ({}) updated", head.table_id, table.name());
            self.completed[tid] = Some(table);
            return Ok(SectionOutcome::Promoted);
        }

        if self.completed[tid]
            .as_ref()
            .is_some_and(|t| t.version_number == head.version_number)
        {
            return Ok(SectionOutcome::SameVersion);
        }

        let sections = usize::from(head.last_section_number) + 1;
        if sections > limits.max_sections {
            return Err(DemuxError::TableFull {
                table_id: head.table_id,
                limit: limits.max_sections,
            });
        }

        let restart = match &self.partial[tid] {
            None => true,
            Some(p) if p.version_number != head.version_number => {
                debug!(
                    "table 0x{:02X}: version {} -> {}, partial discarded",
                    head.table_id, p.version_number, head.version_number
                );
                self.epoch_resets += 1;
                true
            }
            Some(_) => false,
        };
        if restart {
            let Some(table) = Table::new(head) else {
                debug!("table 0x{:02X}: no parser, ignored", head.table_id);
                return Ok(SectionOutcome::Unsupported);
            };
            self.partial[tid] = Some(table);
        }

        let Some(partial) = self.partial[tid].as_mut() else {
            return Ok(SectionOutcome::Unsupported);
        };
        if partial.sections.contains(head.section_number) {
            return Ok(SectionOutcome::Duplicate);
        }
        partial.sections.insert(head.section_number);
        partial.head = *head;

        if let Err(e) = partial.data.parse_section(head, section.body(), limits) {
            warn!(
                "table 0x{:02X} section {}: {e}; partial discarded",
                head.table_id, head.section_number
            );
            self.partial[tid] = None;
            return Err(e);
        }

        if !partial.is_complete() {
            return Ok(SectionOutcome::Added);
        }
        if let Some(table) = self.partial[tid].take() {
            debug!(
                "table 0x{:02X} ({}) version {} complete",
                table.table_id,
                table.name(),
                table.version_number
            );
            self.completed[tid] = Some(table);
        }
        Ok(SectionOutcome::Promoted)
    }

    pub fn completed(&self, table_id: u8) -> Option<&Table> {
        self.completed[usize::from(table_id)].as_ref()
    }

    pub fn partial(&self, table_id: u8) -> Option<&Table> {
        self.partial[usize::from(table_id)].as_ref()
    }

    /// Completed tables in table id order.
    pub fn completed_tables(&self) -> impl Iterator<Item = &Table> {
        self.completed.iter().flatten()
    }

    pub fn completed_count(&self) -> usize {
        self.completed_tables().count()
    }

    /// Partial tables replaced because a newer version arrived.
    pub fn epoch_resets(&self) -> u64 {
        self.epoch_resets
    }
}
