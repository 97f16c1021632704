//! Transport stream demultiplexer: PID registry, section dispatch and
//! table store.

pub mod detect;
pub mod filter;
pub mod pes;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use serde::Serialize;

use crate::config::{DemuxConfig, ParseLimits};
use crate::constants::*;
use crate::error::{DemuxError, Result};
use crate::packet::Packet;
use crate::psi::section::Section;
use crate::psi::store::{SectionOutcome, TableStore};
use crate::psi::table::Table;
use crate::stats::StatsManager;

use detect::PacketSize;
use filter::{ContinuityStatus, Filter, FilterKind, FilterOutput};
use pes::PesUnit;

/// A retained packet, stamped on arrival.
#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord {
    pub packet: Packet,
    pub received_at: DateTime<Utc>,
}

/// Stream types whose PIDs carry sections rather than PES.
fn stream_type_carries_sections(stream_type: u8) -> bool {
    matches!(stream_type, 0x05 | 0x0A..=0x0D | 0x86)
}

pub struct Demuxer {
    config: DemuxConfig,
    limits: ParseLimits,
    filters: Vec<Option<Filter>>,
    store: TableStore,
    history: Vec<PacketRecord>,
    pes_units: Vec<PesUnit>,
    stats: StatsManager,
    continuity_error: bool,
    ignored_packets: u64,
    discarded_sections: u64,
    packet_count: u64,
}

impl Demuxer {
    /// Create a demuxer with Section filters on the well-known PSI/SI PIDs
    /// and a discard filter on the null PID.
    pub fn new(config: DemuxConfig) -> Result<Self> {
        let mut history = Vec::new();
        if config.store_parsed_packets {
            history.try_reserve_exact(config.initial_packet_history_capacity as usize)?;
        }
        let mut filters: Vec<Option<Filter>> = Vec::new();
        filters.try_reserve_exact(PID_COUNT)?;
        filters.resize_with(PID_COUNT, || None);
        for &pid in SECTION_PIDS {
            filters[usize::from(pid)] = Some(Filter::new(pid, FilterKind::Section));
        }
        filters[usize::from(PID_NULL)] = Some(Filter::new(PID_NULL, FilterKind::Null));

        Ok(Self {
            limits: config.limits(),
            config,
            filters,
            store: TableStore::new(),
            history,
            pes_units: Vec::new(),
            stats: StatsManager::new(),
            continuity_error: false,
            ignored_packets: 0,
            discarded_sections: 0,
            packet_count: 0,
        })
    }

    /// Parse one 188-byte packet and route it to its PID filter.
    pub fn add_packet(&mut self, data: &[u8]) -> Result<()> {
        let packet = Packet::parse(data)?;
        self.packet_count += 1;
        trace!(
            "packet #{} PID 0x{:04X} cc {} pusi {}",
            self.packet_count,
            packet.pid,
            packet.continuity_counter,
            packet.payload_unit_start_indicator
        );

        if self.config.store_parsed_packets {
            self.history.try_reserve(1)?;
            self.history.push(PacketRecord {
                packet: packet.clone(),
                received_at: Utc::now(),
            });
        }

        let slot = usize::from(packet.pid);
        if self.filters[slot].is_none() {
            if !is_custom_pid(packet.pid) {
                return Err(DemuxError::UnknownPidPacket(packet.pid));
            }
            // a unit start without payload cannot be classified yet
            if !packet.payload_unit_start_indicator || packet.payload.is_empty() {
                self.ignored_packets += 1;
                self.stats.record_packet(&packet, None);
                return Ok(());
            }
            let kind = if packet.payload.starts_with(&PES_START_CODE) {
                FilterKind::Pes
            } else {
                FilterKind::Section
            };
            debug!("PID 0x{:04X}: {kind:?} filter created on first unit start", packet.pid);
            self.filters[slot] = Some(Filter::new(packet.pid, kind));
        }

        let mut out = FilterOutput::default();
        let (applied, continuity) = match self.filters[slot].as_mut() {
            Some(filter) => {
                let applied = filter.apply(&packet, &mut out);
                (applied, filter.last_continuity_status())
            }
            None => return Err(DemuxError::UnknownPidPacket(packet.pid)),
        };
        // latched and counted even when the payload was rejected
        if matches!(continuity, Some(ContinuityStatus::Discontinuity { .. })) {
            self.continuity_error = true;
        }
        self.stats.record_packet(&packet, continuity);
        applied?;
        self.dispatch(out)
    }

    /// Feed a raw byte buffer in any of the supported strides.
    pub fn add_buffer(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(DemuxError::InvalidArgument("empty buffer"));
        }
        let Some(mut pos) = data.iter().position(|&b| b == TS_SYNC_BYTE) else {
            warn!("no sync byte in {} bytes", data.len());
            return self.end_of_buffer();
        };

        let size = PacketSize::detect(data);
        if size != PacketSize::Unknown {
            self.stats.set_packet_size(size);
        }
        let stride = size.stride().unwrap_or(TS_PACKET_SIZE);

        while pos + TS_PACKET_SIZE <= data.len() {
            if data[pos] != TS_SYNC_BYTE {
                match data[pos..].iter().position(|&b| b == TS_SYNC_BYTE) {
                    Some(skip) => {
                        warn!("sync lost at offset {pos}, skipping {skip} bytes");
                        self.stats.record_sync_loss();
                        pos += skip;
                        continue;
                    }
                    None => break,
                }
            }
            self.add_packet(&data[pos..pos + TS_PACKET_SIZE])?;
            pos += stride;
        }
        self.end_of_buffer()
    }

    fn end_of_buffer(&mut self) -> Result<()> {
        if self.config.flush_on_buffer_end {
            self.flush_all()
        } else {
            Ok(())
        }
    }

    /// Final completion pass over every filter. Incomplete sections are
    /// dropped; calling it again changes nothing.
    pub fn flush_all(&mut self) -> Result<()> {
        let mut out = FilterOutput::default();
        let mut failed = None;
        for filter in self.filters.iter_mut().flatten() {
            if let Err(e) = filter.flush(&mut out) {
                warn!("PID 0x{:04X}: flush failed: {e}", filter.pid());
                failed.get_or_insert(e);
            }
        }
        self.dispatch(out)?;
        failed.map_or(Ok(()), Err)
    }

    /// Register a filter on `pid`. Returns false when one already exists.
    pub fn register_filter(&mut self, pid: u16, kind: FilterKind) -> Result<bool> {
        if pid > PID_MAX {
            return Err(DemuxError::InvalidArgument("PID above 0x1FFF"));
        }
        let slot = &mut self.filters[usize::from(pid)];
        if slot.is_some() {
            return Ok(false);
        }
        debug!("PID 0x{pid:04X}: {kind:?} filter registered");
        *slot = Some(Filter::new(pid, kind));
        Ok(true)
    }

    fn dispatch(&mut self, out: FilterOutput) -> Result<()> {
        for unit in out.pes_units {
            self.stats.record_pes_unit(unit.pid);
            if self.config.collect_pes {
                self.pes_units.try_reserve(1)?;
                self.pes_units.push(unit);
            }
        }
        let total = out.sections.len();
        for (i, section) in out.sections.iter().enumerate() {
            if let Err(e) = self.add_section(section) {
                // the first error aborts; later sections of the same batch are lost
                let lost = total - i - 1;
                if lost > 0 {
                    warn!(
                        "{lost} section(s) discarded after table 0x{:02X} failed",
                        section.head.table_id
                    );
                    self.discarded_sections += lost as u64;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn add_section(&mut self, section: &Section) -> Result<()> {
        if self.config.verify_crc {
            section.verify_crc()?;
        }
        let outcome = self.store.add_section(section, &self.limits)?;
        if outcome == SectionOutcome::Promoted {
            self.on_promoted(section.head.table_id)?;
        }
        Ok(())
    }

    /// Follow PAT and PMT content into filter registrations.
    fn on_promoted(&mut self, table_id: u8) -> Result<()> {
        let mut wanted: Vec<(u16, FilterKind)> = Vec::new();
        match self.store.completed(table_id) {
            Some(t) if table_id == TID_PAT => {
                if let Some(pat) = t.as_pat() {
                    wanted.extend(pat.pmt_pids().map(|(_, pid)| (pid, FilterKind::Section)));
                }
            }
            Some(t) if table_id == TID_PMT => {
                if let Some(pmt) = t.as_pmt() {
                    wanted.extend(pmt.streams.iter().map(|s| {
                        let kind = if stream_type_carries_sections(s.stream_type) {
                            FilterKind::Section
                        } else {
                            FilterKind::Pes
                        };
                        (s.elementary_pid, kind)
                    }));
                }
            }
            _ => {}
        }
        for (pid, kind) in wanted {
            if pid != PID_NULL {
                self.register_filter(pid, kind)?;
            }
        }
        Ok(())
    }

    /// Latched once any PID saw a continuity error.
    pub fn continuity_error_detected(&self) -> bool {
        self.continuity_error
    }

    /// Custom-PID packets dropped because no unit started yet.
    pub fn ignored_packet_count(&self) -> u64 {
        self.ignored_packets
    }

    /// Completed sections never handed to the store because an earlier
    /// section of the same packet (or flush) failed.
    pub fn discarded_section_count(&self) -> u64 {
        self.discarded_sections
    }

    pub fn packet_count(&self) -> u64 {
        self.packet_count
    }

    /// Most recent completed table for `table_id`.
    pub fn table(&self, table_id: u8) -> Option<&Table> {
        self.store.completed(table_id)
    }

    pub fn partial_table(&self, table_id: u8) -> Option<&Table> {
        self.store.partial(table_id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.store.completed_tables()
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn packet_history(&self) -> &[PacketRecord] {
        &self.history
    }

    pub fn pes_units(&self) -> &[PesUnit] {
        &self.pes_units
    }

    pub fn take_pes_units(&mut self) -> Vec<PesUnit> {
        std::mem::take(&mut self.pes_units)
    }

    pub fn filter(&self, pid: u16) -> Option<&Filter> {
        self.filters.get(usize::from(pid))?.as_ref()
    }

    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter().flatten()
    }

    pub fn filter_count(&self) -> usize {
        self.filters().count()
    }

    pub fn packet_size(&self) -> PacketSize {
        self.stats.packet_size()
    }

    pub fn stats(&self) -> &StatsManager {
        &self.stats
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0xFFu8; TS_PACKET_SIZE];
        data[0] = TS_SYNC_BYTE;
        data[1] = (if pusi { 0x40 } else { 0 }) | (pid >> 8) as u8;
        data[2] = pid as u8;
        data[3] = 0x10 | cc;
        data[4..4 + payload.len()].copy_from_slice(payload);
        data
    }

    #[test]
    fn test_default_registry() {
        let demux = Demuxer::new(DemuxConfig::default()).unwrap();
        assert_eq!(demux.filter_count(), SECTION_PIDS.len() + 1);
        assert_eq!(demux.filter(PID_PAT).unwrap().kind(), FilterKind::Section);
        assert_eq!(demux.filter(PID_NULL).unwrap().kind(), FilterKind::Null);
        assert!(demux.filter(0x0100).is_none());
    }

    #[test]
    fn test_reserved_pid_is_unknown() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        let err = demux.add_packet(&ts(0x0007, true, 0, &[0])).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnknownPidPacket);
    }

    #[test]
    fn test_custom_pid_classification() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        demux
            .add_packet(&ts(0x0100, true, 0, &[0x00, 0x00, 0x01, 0xE0, 0x00, 0x00]))
            .unwrap();
        demux.add_packet(&ts(0x0101, true, 0, &[0x00, 0x02])).unwrap();
        assert_eq!(demux.filter(0x0100).unwrap().kind(), FilterKind::Pes);
        assert_eq!(demux.filter(0x0101).unwrap().kind(), FilterKind::Section);
    }

    #[test]
    fn test_history() {
        let config = DemuxConfig {
            store_parsed_packets: true,
            ..DemuxConfig::default()
        };
        let mut demux = Demuxer::new(config).unwrap();
        demux.add_packet(&ts(PID_NULL, false, 0, &[])).unwrap();
        demux.add_packet(&ts(PID_NULL, false, 1, &[])).unwrap();
        assert_eq!(demux.packet_history().len(), 2);
        assert!(demux.packet_history().iter().all(|r| r.packet.pid == PID_NULL));

        let json = serde_json::to_value(&demux.packet_history()[0]).unwrap();
        assert_eq!(json["packet"]["continuity_counter"], 0);
        assert!(json["received_at"].is_string());
    }

    #[test]
    fn test_continuity_latched_when_section_fails() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        demux.add_packet(&ts(PID_PAT, true, 0, &[0x00])).unwrap();
        // CC jumps to 5 and the head announces section 3 of 1
        let bad = [0x00, 0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x03, 0x01];
        let err = demux.add_packet(&ts(PID_PAT, true, 5, &bad)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidData);
        assert!(demux.filter(PID_PAT).unwrap().continuity_error_detected());
        assert!(demux.continuity_error_detected());
        assert_eq!(demux.stats().get(PID_PAT).unwrap().continuity_errors, 1);
        assert_eq!(demux.stats().get(PID_PAT).unwrap().packets, 2);
    }

    #[test]
    fn test_unit_start_without_payload_defers_classification() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        let mut adaptation_only = ts(0x0100, true, 0, &[]);
        adaptation_only[3] = 0x20;
        adaptation_only[4] = 183;
        adaptation_only[5] = 0x00;
        demux.add_packet(&adaptation_only).unwrap();
        assert!(demux.filter(0x0100).is_none());
        assert_eq!(demux.ignored_packet_count(), 1);

        demux
            .add_packet(&ts(0x0100, true, 1, &[0x00, 0x00, 0x01, 0xE0, 0x00, 0x00]))
            .unwrap();
        assert_eq!(demux.filter(0x0100).unwrap().kind(), FilterKind::Pes);
    }

    #[test]
    fn test_sections_after_failure_are_counted() {
        use crate::psi::section::crc32;

        let config = DemuxConfig {
            verify_crc: true,
            ..DemuxConfig::default()
        };
        let mut demux = Demuxer::new(config).unwrap();
        let mut pat = vec![0x00, 0xB0, 0x0D, 0x00, 0x01, 0xC1, 0x00, 0x00, 0x00, 0x01, 0xE0, 0x20];
        let crc = crc32(&pat) ^ 0xFFFF_FFFF;
        pat.extend_from_slice(&crc.to_be_bytes());
        let mut cat = vec![0x01, 0xB0, 0x09, 0xFF, 0xFF, 0xC1, 0x00, 0x00];
        let crc = crc32(&cat);
        cat.extend_from_slice(&crc.to_be_bytes());

        let mut payload = vec![0x00];
        payload.extend_from_slice(&pat);
        payload.extend_from_slice(&cat);
        let err = demux.add_packet(&ts(PID_PAT, true, 0, &payload)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidData);
        assert_eq!(demux.discarded_section_count(), 1);
        assert!(demux.table(TID_PAT).is_none());
        assert!(demux.table(TID_CAT).is_none());
    }

    #[test]
    fn test_register_filter() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        assert!(demux.register_filter(0x0200, FilterKind::Pes).unwrap());
        assert!(!demux.register_filter(0x0200, FilterKind::Section).unwrap());
        assert!(demux.register_filter(0x2000, FilterKind::Pes).is_err());
    }

    #[test]
    fn test_empty_buffer() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        let err = demux.add_buffer(&[]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut demux = Demuxer::new(DemuxConfig::default()).unwrap();
        let mut buf = ts(PID_NULL, false, 0, &[]);
        buf.extend_from_slice(&[0x00; 7]);
        buf.extend_from_slice(&ts(PID_NULL, false, 1, &[]));
        buf.extend_from_slice(&ts(PID_NULL, false, 2, &[]));
        demux.add_buffer(&buf).unwrap();
        assert_eq!(demux.packet_count(), 3);
        assert_eq!(demux.stats().sync_losses(), 1);
    }
}
