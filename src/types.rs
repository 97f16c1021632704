use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::DemuxConfig;
use crate::psi::table::Table;
use crate::stats::PidStats;

/// Elementary stream of a program, from its PMT
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    pub pid: u16,
    pub stream_type: u8,
    pub pes_units: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<f64>,
}

/// Program information containing all its streams (public API)
#[derive(Debug, Clone, Serialize)]
pub struct ProgramInfo {
    pub program_number: u16,
    pub pmt_pid: u16,
    pub streams: Vec<StreamInfo>,
    /// PCR PID for this program (from PMT)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pcr_pid: Option<u16>,
    /// PMT version for change tracking
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmt_version: Option<u8>,
}

/// Per-PID counters plus the filter attached to it
#[derive(Debug, Clone, Serialize)]
pub struct PidReport {
    pub pid: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(flatten)]
    pub stats: PidStats,
    pub bitrate_kbps: f64,
}

/// Demuxer-wide counters
#[derive(Debug, Clone, Serialize)]
pub struct DemuxCounters {
    pub packets: u64,
    pub ignored_packets: u64,
    pub discarded_sections: u64,
    pub sync_losses: u64,
    pub continuity_errors: u64,
    pub continuity_error_detected: bool,
    pub epoch_resets: u64,
    pub filters: usize,
}

/// Complete snapshot of a demuxer
#[derive(Debug, Clone, Serialize)]
pub struct DemuxReport {
    pub timestamp: String,
    pub packet_size: String,
    pub counters: DemuxCounters,
    pub pids: Vec<PidReport>,
    pub programs: Vec<ProgramInfo>,
    pub tables: Vec<Table>,
    /// PAT programs missing from the SDT, if both are known
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services_missing_from_sdt: Vec<u16>,
}

/// Where the inspector reads transport stream bytes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Udp(SocketAddr),
}

/// Configuration options for the inspector
#[derive(Debug, Clone)]
pub struct Options {
    pub source: Source,
    pub refresh_secs: u64,
    pub config: DemuxConfig,
}
