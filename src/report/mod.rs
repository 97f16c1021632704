//! Report generation for demultiplexer state

use std::collections::BTreeSet;

use crate::constants::{TID_PAT, TID_PMT, TID_SDT_ACTUAL};
use crate::demux::Demuxer;
use crate::types::{DemuxCounters, DemuxReport, PidReport, ProgramInfo, StreamInfo};

/// Report generator for demuxer snapshots
pub struct Reporter;

impl Reporter {
    /// Generate a structured DemuxReport for API consumers
    pub fn create_report(demux: &Demuxer) -> DemuxReport {
        let stats = demux.stats();

        let pids = stats
            .iter()
            .map(|(&pid, s)| PidReport {
                pid,
                filter: demux.filter(pid).map(|f| format!("{:?}", f.kind())),
                stats: s.clone(),
                bitrate_kbps: stats.calculate_bitrate(pid).unwrap_or(0.0),
            })
            .collect();

        DemuxReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            packet_size: demux.packet_size().to_string(),
            counters: DemuxCounters {
                packets: demux.packet_count(),
                ignored_packets: demux.ignored_packet_count(),
                discarded_sections: demux.discarded_section_count(),
                sync_losses: stats.sync_losses(),
                continuity_errors: stats.total_continuity_errors(),
                continuity_error_detected: demux.continuity_error_detected(),
                epoch_resets: demux.store().epoch_resets(),
                filters: demux.filter_count(),
            },
            pids,
            programs: Self::programs(demux),
            tables: demux.tables().cloned().collect(),
            services_missing_from_sdt: Self::services_missing_from_sdt(demux),
        }
    }

    /// Generate pretty-printed JSON string for CLI output
    pub fn generate_json_report(demux: &Demuxer) -> String {
        let rep = Self::create_report(demux);
        serde_json::to_string_pretty(&rep)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }

    /// Programs of the PAT, joined with the PMT when its program matches.
    fn programs(demux: &Demuxer) -> Vec<ProgramInfo> {
        let Some(pat) = demux.table(TID_PAT).and_then(|t| t.as_pat()) else {
            return Vec::new();
        };
        let pmt_table = demux.table(TID_PMT);
        let stats = demux.stats();

        pat.pmt_pids()
            .map(|(program_number, pmt_pid)| {
                let pmt = pmt_table
                    .and_then(|t| t.as_pmt().map(|p| (t.version_number, p)))
                    .filter(|(_, p)| p.program_number == program_number);
                let streams = pmt
                    .map(|(_, p)| {
                        p.streams
                            .iter()
                            .map(|s| StreamInfo {
                                pid: s.elementary_pid,
                                stream_type: s.stream_type,
                                pes_units: stats.get(s.elementary_pid).map_or(0, |st| st.pes_units),
                                bitrate_kbps: stats.calculate_bitrate(s.elementary_pid),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                ProgramInfo {
                    program_number,
                    pmt_pid,
                    streams,
                    pcr_pid: pmt.map(|(_, p)| p.pcr_pid),
                    pmt_version: pmt.map(|(v, _)| v),
                }
            })
            .collect()
    }

    /// Service_ID mismatch between SDT and the PAT program list
    fn services_missing_from_sdt(demux: &Demuxer) -> Vec<u16> {
        let pat = demux.table(TID_PAT).and_then(|t| t.as_pat());
        let sdt = demux.table(TID_SDT_ACTUAL).and_then(|t| t.as_sdt());
        let (Some(pat), Some(sdt)) = (pat, sdt) else {
            return Vec::new();
        };
        let sdt_services: BTreeSet<u16> = sdt.services.iter().map(|s| s.service_id).collect();
        pat.pmt_pids()
            .map(|(program_number, _)| program_number)
            .filter(|n| !sdt_services.contains(n))
            .collect()
    }
}
