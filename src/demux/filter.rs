//! Per-PID filter: continuity tracking and payload reassembly.

use bytes::Bytes;
use log::{debug, trace, warn};
use serde::Serialize;

use crate::constants::{ACCUMULATOR_INITIAL_CAPACITY, TID_STUFFING};
use crate::demux::pes::{PesAssembler, PesUnit};
use crate::error::Result;
use crate::packet::Packet;
use crate::psi::section::{Section, SectionHead};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FilterKind {
    /// PSI/SI sections behind a pointer field.
    Section,
    /// PES units.
    Pes,
    /// Consumes packets without looking at them (null PID).
    Null,
}

/// Section reassembly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionState {
    /// No section in progress; continuation packets are ignored.
    Idle,
    /// Section started, head not fully buffered.
    AwaitingHead,
    /// Head decoded, waiting for `expected_payload_size` bytes.
    Accumulating,
    /// Section handed out; left immediately.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContinuityStatus {
    /// First payload packet on the PID.
    Initial,
    Ok,
    /// Same counter as the previous packet; payload not re-applied.
    Duplicate,
    Discontinuity { expected: u8, actual: u8 },
    /// Packets without payload do not advance the counter.
    NoPayload,
}

/// Everything one packet produced.
#[derive(Debug, Default)]
pub struct FilterOutput {
    pub sections: Vec<Section>,
    pub pes_units: Vec<PesUnit>,
}

impl FilterOutput {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.pes_units.is_empty()
    }
}

#[derive(Debug)]
pub struct Filter {
    pid: u16,
    kind: FilterKind,
    state: SectionState,
    accumulator: Vec<u8>,
    head: Option<SectionHead>,
    expected_payload_size: usize,
    last_cc: Option<u8>,
    last_status: Option<ContinuityStatus>,
    continuity_error_detected: bool,
    pes: PesAssembler,
    sections_completed: u64,
    sections_dropped: u64,
}

impl Filter {
    pub fn new(pid: u16, kind: FilterKind) -> Self {
        Self {
            pid,
            kind,
            state: SectionState::Idle,
            accumulator: Vec::new(),
            head: None,
            expected_payload_size: 0,
            last_cc: None,
            last_status: None,
            continuity_error_detected: false,
            pes: PesAssembler::new(),
            sections_completed: 0,
            sections_dropped: 0,
        }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    pub fn head(&self) -> Option<&SectionHead> {
        self.head.as_ref()
    }

    pub fn expected_payload_size(&self) -> usize {
        self.expected_payload_size
    }

    pub fn accumulated(&self) -> usize {
        self.accumulator.len()
    }

    pub fn last_continuity_counter(&self) -> Option<u8> {
        self.last_cc
    }

    /// Continuity verdict of the last packet applied, even when applying it failed.
    pub fn last_continuity_status(&self) -> Option<ContinuityStatus> {
        self.last_status
    }

    pub fn continuity_error_detected(&self) -> bool {
        self.continuity_error_detected
    }

    pub fn sections_completed(&self) -> u64 {
        self.sections_completed
    }

    pub fn sections_dropped(&self) -> u64 {
        self.sections_dropped
    }

    pub fn pes_units(&self) -> u64 {
        self.pes.units()
    }

    pub fn invalid_pes_units(&self) -> u64 {
        self.pes.invalid_units()
    }

    fn check_continuity(&mut self, packet: &Packet) -> ContinuityStatus {
        if !packet.has_payload() {
            return ContinuityStatus::NoPayload;
        }
        let cc = packet.continuity_counter;
        let status = match self.last_cc {
            None => ContinuityStatus::Initial,
            Some(last) if cc == (last + 1) & 0x0F => ContinuityStatus::Ok,
            Some(last) if cc == last => ContinuityStatus::Duplicate,
            Some(last) => ContinuityStatus::Discontinuity {
                expected: (last + 1) & 0x0F,
                actual: cc,
            },
        };
        if status != ContinuityStatus::Duplicate {
            self.last_cc = Some(cc);
        }
        status
    }

    /// Apply one packet addressed to this PID.
    pub fn apply(&mut self, packet: &Packet, out: &mut FilterOutput) -> Result<ContinuityStatus> {
        let continuity = self.check_continuity(packet);
        self.last_status = Some(continuity);
        match continuity {
            ContinuityStatus::Duplicate => {
                trace!("PID 0x{:04X}: duplicate CC {}", self.pid, packet.continuity_counter);
                return Ok(continuity);
            }
            ContinuityStatus::Discontinuity { expected, actual } => {
                self.continuity_error_detected = true;
                if self.kind != FilterKind::Null {
                    warn!(
                        "PID 0x{:04X}: continuity error, expected {expected} got {actual}",
                        self.pid
                    );
                }
                self.discard();
            }
            _ => {}
        }

        if packet.payload.is_empty() {
            return Ok(continuity);
        }
        match self.kind {
            FilterKind::Null => {}
            FilterKind::Section => {
                self.push_section_payload(
                    packet.payload_unit_start_indicator,
                    &packet.payload,
                    &mut out.sections,
                )?
            }
            FilterKind::Pes => self.pes.push(
                self.pid,
                packet.payload_unit_start_indicator,
                &packet.payload,
                &mut out.pes_units,
            )?,
        }
        Ok(continuity)
    }

    /// Final completion pass: emit finished work, drop incomplete sections.
    /// A second call finds nothing left.
    pub fn flush(&mut self, out: &mut FilterOutput) -> Result<()> {
        match self.kind {
            FilterKind::Section => {
                self.drain_sections(&mut out.sections)?;
                self.flush_accumulated();
            }
            FilterKind::Pes => self.pes.finish(self.pid, &mut out.pes_units),
            FilterKind::Null => {}
        }
        Ok(())
    }

    fn push_section_payload(
        &mut self,
        unit_start: bool,
        payload: &[u8],
        out: &mut Vec<Section>,
    ) -> Result<()> {
        if !unit_start {
            if self.state == SectionState::Idle {
                return Ok(());
            }
            self.extend(payload)?;
            return self.drain_sections(out);
        }

        let pointer = usize::from(payload[0]);
        let rest = &payload[1..];
        if pointer > rest.len() {
            warn!(
                "PID 0x{:04X}: pointer_field {pointer} beyond payload, section dropped",
                self.pid
            );
            self.flush_accumulated();
            return Ok(());
        }
        let (tail, start) = rest.split_at(pointer);
        if self.state != SectionState::Idle {
            self.extend(tail)?;
            self.drain_sections(out)?;
        }
        self.flush_accumulated();

        self.state = SectionState::AwaitingHead;
        self.extend(start)?;
        self.drain_sections(out)
    }

    /// Decode heads and hand out every complete section in the accumulator.
    fn drain_sections(&mut self, out: &mut Vec<Section>) -> Result<()> {
        loop {
            match self.state {
                SectionState::Idle | SectionState::Complete => return Ok(()),
                SectionState::AwaitingHead => {
                    let Some(&table_id) = self.accumulator.first() else {
                        self.state = SectionState::Idle;
                        return Ok(());
                    };
                    if table_id == TID_STUFFING {
                        self.accumulator.clear();
                        self.state = SectionState::Idle;
                        return Ok(());
                    }
                    let Some(size) = SectionHead::size_for(&self.accumulator) else {
                        return Ok(());
                    };
                    if self.accumulator.len() < size {
                        return Ok(());
                    }
                    if !SectionHead::length_is_legal(&self.accumulator) {
                        warn!(
                            "PID 0x{:04X}: table 0x{table_id:02X} with illegal section_length dropped",
                            self.pid
                        );
                        self.sections_dropped += 1;
                        self.reset_section();
                        return Ok(());
                    }
                    let head = match SectionHead::parse(&self.accumulator) {
                        Ok(head) => head,
                        Err(e) => {
                            self.sections_dropped += 1;
                            self.reset_section();
                            return Err(e);
                        }
                    };
                    self.expected_payload_size = head.expected_payload_size();
                    self.head = Some(head);
                    self.state = SectionState::Accumulating;
                }
                SectionState::Accumulating => {
                    let Some(head) = self.head else {
                        self.reset_section();
                        return Ok(());
                    };
                    let total = head.head_size() + self.expected_payload_size;
                    if self.accumulator.len() < total {
                        return Ok(());
                    }
                    self.state = SectionState::Complete;
                    let bytes = Bytes::copy_from_slice(&self.accumulator[..total]);
                    self.accumulator.drain(..total);
                    trace!(
                        "PID 0x{:04X}: table 0x{:02X} section {}/{} complete",
                        self.pid, head.table_id, head.section_number, head.last_section_number
                    );
                    out.push(Section::new(head, bytes));
                    self.sections_completed += 1;
                    self.head = None;
                    self.expected_payload_size = 0;
                    self.state = if self.accumulator.is_empty() {
                        SectionState::Idle
                    } else {
                        SectionState::AwaitingHead
                    };
                }
            }
        }
    }

    /// Drop whatever is buffered; complete sections were already handed out.
    fn flush_accumulated(&mut self) {
        let pending = self.state != SectionState::Idle
            && self.accumulator.iter().any(|&b| b != TID_STUFFING);
        if pending {
            debug!(
                "PID 0x{:04X}: incomplete section dropped ({} of {} bytes)",
                self.pid,
                self.accumulator.len(),
                self.head
                    .map_or(0, |h| h.head_size() + self.expected_payload_size)
            );
            self.sections_dropped += 1;
        }
        self.reset_section();
    }

    fn reset_section(&mut self) {
        self.accumulator.clear();
        self.head = None;
        self.expected_payload_size = 0;
        self.state = SectionState::Idle;
    }

    fn discard(&mut self) {
        match self.kind {
            FilterKind::Section => self.flush_accumulated(),
            FilterKind::Pes => self.pes.reset(),
            FilterKind::Null => {}
        }
    }

    /// Grow geometrically from one packet payload.
    fn extend(&mut self, data: &[u8]) -> Result<()> {
        let needed = self.accumulator.len() + data.len();
        if needed > self.accumulator.capacity() {
            let mut cap = self
                .accumulator
                .capacity()
                .max(ACCUMULATOR_INITIAL_CAPACITY);
            while cap < needed {
                cap *= 2;
            }
            self.accumulator
                .try_reserve_exact(cap - self.accumulator.len())?;
        }
        self.accumulator.extend_from_slice(data);
        Ok(())
    }
}
