//! Per-PID transport statistics

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

use crate::constants::TS_PACKET_SIZE;
use crate::demux::detect::PacketSize;
use crate::demux::filter::ContinuityStatus;
use crate::packet::{Packet, ScramblingControl};

/// Counters for one PID
#[derive(Debug, Clone, Serialize)]
pub struct PidStats {
    pub packets: u64,
    pub payload_bytes: u64,
    pub continuity_errors: u64,
    pub duplicates: u64,
    pub unit_starts: u64,
    pub transport_errors: u64,
    pub scrambled: u64,
    pub pes_units: u64,
    #[serde(skip)]
    pub first_seen: Instant,
}

impl PidStats {
    fn new() -> Self {
        Self {
            packets: 0,
            payload_bytes: 0,
            continuity_errors: 0,
            duplicates: 0,
            unit_starts: 0,
            transport_errors: 0,
            scrambled: 0,
            pes_units: 0,
            first_seen: Instant::now(),
        }
    }
}

/// Collects packet counters per PID plus demuxer-wide counters
pub struct StatsManager {
    pid_stats: BTreeMap<u16, PidStats>,
    sync_losses: u64,
    packet_size: PacketSize,
}

impl StatsManager {
    pub fn new() -> Self {
        Self {
            pid_stats: BTreeMap::new(),
            sync_losses: 0,
            packet_size: PacketSize::Unknown,
        }
    }

    /// Account a packet after its filter ran
    pub fn record_packet(&mut self, packet: &Packet, continuity: Option<ContinuityStatus>) {
        let stats = self
            .pid_stats
            .entry(packet.pid)
            .or_insert_with(PidStats::new);
        stats.packets += 1;
        stats.payload_bytes += packet.payload.len() as u64;
        if packet.payload_unit_start_indicator {
            stats.unit_starts += 1;
        }
        if packet.transport_error_indicator {
            stats.transport_errors += 1;
        }
        if packet.scrambling_control != ScramblingControl::NotScrambled {
            stats.scrambled += 1;
        }
        match continuity {
            Some(ContinuityStatus::Duplicate) => stats.duplicates += 1,
            Some(ContinuityStatus::Discontinuity { .. }) => stats.continuity_errors += 1,
            _ => {}
        }
    }

    pub fn record_pes_unit(&mut self, pid: u16) {
        self.pid_stats
            .entry(pid)
            .or_insert_with(PidStats::new)
            .pes_units += 1;
    }

    pub fn record_sync_loss(&mut self) {
        self.sync_losses += 1;
    }

    pub fn set_packet_size(&mut self, size: PacketSize) {
        self.packet_size = size;
    }

    pub fn packet_size(&self) -> PacketSize {
        self.packet_size
    }

    pub fn sync_losses(&self) -> u64 {
        self.sync_losses
    }

    pub fn get(&self, pid: u16) -> Option<&PidStats> {
        self.pid_stats.get(&pid)
    }

    /// Calculate bitrate for a PID in kbps, counting whole packets
    pub fn calculate_bitrate(&self, pid: u16) -> Option<f64> {
        let stats = self.pid_stats.get(&pid)?;
        let seconds = stats.first_seen.elapsed().as_secs_f64().max(0.1);
        Some((stats.packets as f64 * TS_PACKET_SIZE as f64 * 8.0 / 1000.0) / seconds)
    }

    pub fn total_continuity_errors(&self) -> u64 {
        self.pid_stats.values().map(|s| s.continuity_errors).sum()
    }

    /// Iterate in PID order
    pub fn iter(&self) -> impl Iterator<Item = (&u16, &PidStats)> {
        self.pid_stats.iter()
    }
}

impl Default for StatsManager {
    fn default() -> Self {
        Self::new()
    }
}
