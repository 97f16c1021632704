//! Packet and section builders shared by the integration tests.
#![allow(dead_code)]

use mpegts_demux::psi::section::crc32;

pub const TS: usize = 188;

/// One 188-byte packet. Payloads shorter than 184 bytes are preceded by
/// adaptation-field stuffing so the payload is exactly `payload`.
pub fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 184, "payload too long");
    let mut data = vec![
        0x47,
        (if pusi { 0x40 } else { 0 }) | (pid >> 8) as u8,
        pid as u8,
        cc & 0x0F,
    ];
    if payload.len() < 184 {
        let afl = 183 - payload.len();
        data[3] |= 0x30;
        data.push(afl as u8);
        if afl > 0 {
            data.push(0x00);
            data.resize(5 + afl, 0xFF);
        }
    } else {
        data[3] |= 0x10;
    }
    data.extend_from_slice(payload);
    assert_eq!(data.len(), TS);
    data
}

/// Packet with a PCR in its adaptation field and no payload.
pub fn pcr_packet(pid: u16, cc: u8, base: u64, ext: u16) -> Vec<u8> {
    let mut data = vec![0x47, (pid >> 8) as u8, pid as u8, 0x20 | (cc & 0x0F), 183, 0x10];
    data.extend_from_slice(&[
        (base >> 25) as u8,
        (base >> 17) as u8,
        (base >> 9) as u8,
        (base >> 1) as u8,
        ((base as u8 & 1) << 7) | 0x7E | (ext >> 8) as u8 & 1,
        ext as u8,
    ]);
    data.resize(TS, 0xFF);
    data
}

/// Null packet.
pub fn null_packet(cc: u8) -> Vec<u8> {
    let mut data = vec![0xFFu8; TS];
    data[..4].copy_from_slice(&[0x47, 0x1F, 0xFF, 0x10 | (cc & 0x0F)]);
    data
}

/// Long-form section with a valid CRC-32.
pub fn long_section(
    table_id: u8,
    id: u16,
    version: u8,
    section_number: u8,
    last_section_number: u8,
    body: &[u8],
) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut s = vec![
        table_id,
        0xB0 | (section_length >> 8) as u8,
        section_length as u8,
        (id >> 8) as u8,
        id as u8,
        0xC1 | ((version & 0x1F) << 1),
        section_number,
        last_section_number,
    ];
    s.extend_from_slice(body);
    let crc = crc32(&s);
    s.extend_from_slice(&crc.to_be_bytes());
    s
}

/// Payload of a unit-start packet: pointer_field 0 then the section.
pub fn with_pointer(section: &[u8]) -> Vec<u8> {
    let mut v = vec![0x00];
    v.extend_from_slice(section);
    v
}

/// PAT body from (program_number, pid) pairs.
pub fn pat_body(programs: &[(u16, u16)]) -> Vec<u8> {
    programs
        .iter()
        .flat_map(|&(n, pid)| [(n >> 8) as u8, n as u8, 0xE0 | (pid >> 8) as u8, pid as u8])
        .collect()
}

/// PMT body from the PCR PID and (stream_type, pid) pairs, no descriptors.
pub fn pmt_body(pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut b = vec![0xE0 | (pcr_pid >> 8) as u8, pcr_pid as u8, 0xF0, 0x00];
    for &(stream_type, pid) in streams {
        b.extend_from_slice(&[stream_type, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x00]);
    }
    b
}

/// SDT body with one service per id, no descriptors.
pub fn sdt_body(original_network_id: u16, services: &[u16]) -> Vec<u8> {
    let mut b = vec![(original_network_id >> 8) as u8, original_network_id as u8, 0xFF];
    for &id in services {
        b.extend_from_slice(&[(id >> 8) as u8, id as u8, 0xFC, 0x80, 0x00]);
    }
    b
}

/// 33-bit PTS with marker bits.
pub fn pts_bytes(prefix: u8, ts: u64) -> [u8; 5] {
    [
        (prefix << 4) | (((ts >> 30) as u8 & 0x07) << 1) | 1,
        (ts >> 22) as u8,
        (((ts >> 15) as u8) << 1) | 1,
        (ts >> 7) as u8,
        ((ts as u8) << 1) | 1,
    ]
}

/// Start of an unbounded video PES unit carrying a PTS.
pub fn pes_start(stream_id: u8, pts: u64, data: &[u8]) -> Vec<u8> {
    let mut v = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00, 0x80, 0x80, 0x05];
    v.extend_from_slice(&pts_bytes(0b0010, pts));
    v.extend_from_slice(data);
    v
}

/// Re-frame 188-byte packets with a 4-byte prefix (M2TS) or a 16-byte suffix (DVB-ASI).
pub fn reframe(packets: &[Vec<u8>], prefix: usize, suffix: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for p in packets {
        out.extend(std::iter::repeat_n(0x00u8, prefix));
        out.extend_from_slice(p);
        out.extend(std::iter::repeat_n(0x00u8, suffix));
    }
    out
}
