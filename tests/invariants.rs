mod common;

use std::collections::HashMap;

use common::*;
use mpegts_demux::config::ParseLimits;
use mpegts_demux::constants::{TID_PAT, TID_PMT, TS_PACKET_SIZE};
use mpegts_demux::reader::ByteReader;
use mpegts_demux::{
    DemuxConfig, Demuxer, DescriptorSet, ErrorKind, FilterKind, Packet, PacketSize, Table,
};

fn program_stream() -> Vec<Vec<u8>> {
    let pat = long_section(TID_PAT, 7, 1, 0, 0, &pat_body(&[(0, 0x0010), (1, 0x0100)]));
    let pmt = long_section(TID_PMT, 1, 2, 0, 0, &pmt_body(0x0101, &[(0x1B, 0x0101), (0x06, 0x0102)]));
    let mut packets = vec![
        ts_packet(0x0000, true, 0, &with_pointer(&pat)),
        ts_packet(0x0100, true, 0, &with_pointer(&pmt)),
        pcr_packet(0x0101, 0, 1_234_567, 42),
    ];
    // two unbounded video units, then a null packet
    packets.push(ts_packet(0x0101, true, 1, &pes_start(0xE0, 90_000, &[0x11; 40])));
    packets.push(ts_packet(0x0101, false, 2, &[0x22; 184]));
    packets.push(ts_packet(0x0101, true, 3, &pes_start(0xE0, 93_003, &[0x33; 10])));
    packets.push(null_packet(0));
    packets
}

#[test]
fn test_pat_pmt_pes_registration() {
    let config = DemuxConfig {
        collect_pes: true,
        ..DemuxConfig::default()
    };
    let mut demux = Demuxer::new(config).unwrap();
    demux.add_buffer(&program_stream().concat()).unwrap();

    assert_eq!(demux.filter(0x0100).unwrap().kind(), FilterKind::Section);
    assert_eq!(demux.filter(0x0101).unwrap().kind(), FilterKind::Pes);
    assert_eq!(demux.filter(0x0102).unwrap().kind(), FilterKind::Pes);

    let pmt = demux.table(TID_PMT).unwrap().as_pmt().unwrap();
    assert_eq!(pmt.program_number, 1);
    assert_eq!(pmt.pcr_pid, 0x0101);
    assert_eq!(pmt.streams.len(), 2);

    // the second unit is closed by the end-of-buffer flush
    let units = demux.pes_units();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0].header.pts, Some(90_000));
    assert_eq!(units[0].data.len(), 40 + 184);
    assert_eq!(units[1].header.pts, Some(93_003));
    assert_eq!(demux.stats().get(0x0101).unwrap().pes_units, 2);
    assert!(!demux.continuity_error_detected());
}

#[test]
fn test_continuity_counters_monotonic() {
    let config = DemuxConfig {
        store_parsed_packets: true,
        ..DemuxConfig::default()
    };
    let mut demux = Demuxer::new(config).unwrap();
    demux.add_buffer(&program_stream().concat()).unwrap();

    let mut last: HashMap<u16, u8> = HashMap::new();
    for record in demux.packet_history() {
        let p = &record.packet;
        assert!(p.payload.len() + p.adaptation_field_length() + 4 <= TS_PACKET_SIZE);
        if !p.has_payload() {
            continue;
        }
        if let Some(prev) = last.insert(p.pid, p.continuity_counter) {
            let cc = p.continuity_counter;
            assert!(cc == prev || cc == (prev + 1) & 0x0F, "PID 0x{:04X}", p.pid);
        }
    }
}

#[test]
fn test_header_round_trip() {
    for raw in program_stream() {
        let packet = Packet::parse(&raw).unwrap();
        assert_eq!(packet.encode().unwrap().as_ref(), raw.as_slice());
    }
    let pcr = Packet::parse(&pcr_packet(0x0101, 5, 1_234_567, 42)).unwrap();
    let af = pcr.adaptation_field.as_ref().unwrap();
    let clock = af.pcr.as_ref().unwrap();
    assert_eq!(clock.base, 1_234_567);
    assert_eq!(clock.extension, 42);
}

#[test]
fn test_double_flush_is_idempotent() {
    let mut demux = demuxer();
    let pat = long_section(TID_PAT, 1, 0, 0, 0, &pat_body(&[(1, 0x0100)]));
    demux
        .add_packet(&ts_packet(0x0000, true, 0, &with_pointer(&pat)))
        .unwrap();
    // incomplete SDT left in the accumulator
    let sdt = long_section(0x42, 1, 0, 0, 0, &sdt_body(1, &[1, 2, 3]));
    demux
        .add_packet(&ts_packet(0x0011, true, 0, &with_pointer(&sdt[..12])))
        .unwrap();

    demux.flush_all().unwrap();
    let first: Vec<Table> = demux.tables().cloned().collect();
    demux.flush_all().unwrap();
    let second: Vec<Table> = demux.tables().cloned().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(demux.filter(0x0011).unwrap().sections_dropped(), 1);
}

#[test]
fn test_descriptor_length_conservation() {
    let loop_bytes = [
        0xF0, 0x0B, // descriptors_length 11
        0x0A, 0x04, b'e', b'n', b'g', 0x00, // ISO 639 language
        0x52, 0x01, 0x01, // stream identifier
        0x48, 0x00, // empty
    ];
    let mut r = ByteReader::new(&loop_bytes);
    let mut set = DescriptorSet::new();
    let declared = set
        .read_loop(&mut r, &ParseLimits::default(), TID_PMT, false)
        .unwrap();
    assert_eq!(set.len(), 3);
    assert_eq!(set.wire_length() + 2, declared + 2);
    assert_eq!(declared, 11);
    assert!(r.is_empty());
}

#[test]
fn test_minimum_section_length() {
    let mut demux = demuxer();
    let head_only = [0x00, 0xB0, 0x05, 0x00, 0x09, 0xC1, 0x00, 0x00];
    demux
        .add_packet(&ts_packet(0x0000, true, 0, &with_pointer(&head_only)))
        .unwrap();
    let pat = demux.table(TID_PAT).unwrap().as_pat().unwrap();
    assert_eq!(pat.transport_stream_id, 9);
    assert!(pat.programs.is_empty());
}

#[test]
fn test_head_only_sections_are_empty_tables() {
    let mut demux = demuxer();
    // (pid, table_id): PMT on a PAT-announced PID, then SDT, NIT, EIT p/f and SIT
    let pat = long_section(TID_PAT, 1, 0, 0, 0, &pat_body(&[(1, 0x0100)]));
    demux
        .add_packet(&ts_packet(0x0000, true, 0, &with_pointer(&pat)))
        .unwrap();
    for (pid, table_id) in [
        (0x0100, TID_PMT),
        (0x0011, 0x42),
        (0x0010, 0x40),
        (0x0012, 0x4E),
        (0x001F, 0x7F),
    ] {
        let head_only = [table_id, 0xB0, 0x05, 0x00, 0x01, 0xC1, 0x00, 0x00];
        demux
            .add_packet(&ts_packet(pid, true, 0, &with_pointer(&head_only)))
            .unwrap();
        assert!(demux.table(table_id).is_some(), "table 0x{table_id:02X}");
    }

    let pmt = demux.table(TID_PMT).unwrap().as_pmt().unwrap();
    assert_eq!(pmt.program_number, 1);
    assert!(pmt.streams.is_empty());
    let sdt = demux.table(0x42).unwrap().as_sdt().unwrap();
    assert_eq!(sdt.transport_stream_id, 1);
    assert!(sdt.services.is_empty());
    assert!(demux.table(0x40).unwrap().as_nit().unwrap().transport_streams.is_empty());
}

#[test]
fn test_pointer_zero_flushes_previous_section() {
    let mut demux = demuxer();
    let stale = long_section(TID_PAT, 1, 0, 0, 0, &pat_body(&[(1, 0x0100)]));
    let fresh = long_section(TID_PAT, 2, 1, 0, 0, &pat_body(&[(3, 0x0300)]));
    demux
        .add_packet(&ts_packet(0x0000, true, 0, &with_pointer(&stale[..10])))
        .unwrap();
    demux
        .add_packet(&ts_packet(0x0000, true, 1, &with_pointer(&fresh)))
        .unwrap();

    let pat = demux.table(TID_PAT).unwrap().as_pat().unwrap();
    assert_eq!(pat.transport_stream_id, 2);
    assert_eq!(pat.programs[0].pid, 0x0300);
    assert_eq!(demux.filter(0x0000).unwrap().sections_dropped(), 1);
}

#[test]
fn test_pusi_less_custom_pid_ignored() {
    let mut demux = demuxer();
    demux
        .add_packet(&ts_packet(0x0300, false, 0, &[0x55; 184]))
        .unwrap();
    assert_eq!(demux.ignored_packet_count(), 1);
    assert!(demux.filter(0x0300).is_none());
}

#[test]
fn test_unregistered_reserved_pid() {
    let mut demux = demuxer();
    let err = demux
        .add_packet(&ts_packet(0x0005, true, 0, &[0x00, 0xFF]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownPidPacket);
    assert_eq!(err.kind().to_string(), "UnknownPidPacket");
}

#[test]
fn test_bad_sync_byte() {
    let mut demux = demuxer();
    let mut raw = null_packet(0);
    raw[0] = 0x48;
    assert_eq!(demux.add_packet(&raw).unwrap_err().kind(), ErrorKind::InvalidData);
}

#[test]
fn test_crc_mismatch_rejected_when_verifying() {
    let mut section = long_section(TID_PAT, 1, 0, 0, 0, &pat_body(&[(1, 0x0100)]));
    let last = section.len() - 1;
    section[last] ^= 0xFF;
    let packet = ts_packet(0x0000, true, 0, &with_pointer(&section));

    let mut lenient = demuxer();
    lenient.add_packet(&packet).unwrap();
    assert!(lenient.table(TID_PAT).is_some());

    let config = DemuxConfig {
        verify_crc: true,
        ..DemuxConfig::default()
    };
    let mut strict = Demuxer::new(config).unwrap();
    let err = strict.add_packet(&packet).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert!(strict.table(TID_PAT).is_none());
}

#[test]
fn test_m2ts_and_dvb_asi_buffers() {
    let packets = program_stream();
    for (prefix, suffix, size) in [(4, 0, PacketSize::M2ts192), (0, 16, PacketSize::Dvb204)] {
        let mut demux = demuxer();
        demux.add_buffer(&reframe(&packets, prefix, suffix)).unwrap();
        assert_eq!(demux.packet_size(), size);
        assert_eq!(demux.packet_count(), packets.len() as u64);
        assert!(demux.table(TID_PMT).is_some());
        assert_eq!(demux.stats().sync_losses(), 0);
    }
}

#[test]
fn test_record_cap_reports_table_full() {
    let config = DemuxConfig {
        max_table_payload_records: 2,
        ..DemuxConfig::default()
    };
    let mut demux = Demuxer::new(config).unwrap();
    let pat = long_section(
        TID_PAT,
        1,
        0,
        0,
        0,
        &pat_body(&[(1, 0x0100), (2, 0x0200), (3, 0x0300)]),
    );
    let err = demux
        .add_packet(&ts_packet(0x0000, true, 0, &with_pointer(&pat)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TableFull);
    assert!(demux.table(TID_PAT).is_none());
}

fn demuxer() -> Demuxer {
    Demuxer::new(DemuxConfig::default()).unwrap()
}
