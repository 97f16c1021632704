//! Packet stride detection by sync-byte probing.

use serde::Serialize;

use crate::constants::{DVB_ASI_PACKET_SIZE, M2TS_PACKET_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PacketSize {
    /// ISO/IEC 13818-1, 188 bytes.
    Ts188,
    /// M2TS, 4-byte timestamp before each packet.
    M2ts192,
    /// DVB-ASI, 16 bytes of FEC after each packet.
    Dvb204,
    Unknown,
}

/// Candidates in tie-break order.
const CANDIDATES: [(PacketSize, usize); 3] = [
    (PacketSize::Ts188, TS_PACKET_SIZE),
    (PacketSize::M2ts192, M2TS_PACKET_SIZE),
    (PacketSize::Dvb204, DVB_ASI_PACKET_SIZE),
];

impl PacketSize {
    pub fn stride(&self) -> Option<usize> {
        match self {
            PacketSize::Ts188 => Some(TS_PACKET_SIZE),
            PacketSize::M2ts192 => Some(M2TS_PACKET_SIZE),
            PacketSize::Dvb204 => Some(DVB_ASI_PACKET_SIZE),
            PacketSize::Unknown => None,
        }
    }

    /// Walk sync bytes from the first 0x47, counting which stride reaches
    /// the next one, and pick the stride with the most hits.
    pub fn detect(buf: &[u8]) -> Self {
        let Some(mut pos) = buf.iter().position(|&b| b == TS_SYNC_BYTE) else {
            return PacketSize::Unknown;
        };

        let mut hits = [0usize; CANDIDATES.len()];
        'walk: loop {
            for (i, (_, stride)) in CANDIDATES.iter().enumerate() {
                if buf.get(pos + stride) == Some(&TS_SYNC_BYTE) {
                    hits[i] += 1;
                    pos += stride;
                    continue 'walk;
                }
            }
            break;
        }

        let mut best = 0;
        for i in 1..hits.len() {
            if hits[i] > hits[best] {
                best = i;
            }
        }
        if hits[best] == 0 {
            PacketSize::Unknown
        } else {
            CANDIDATES[best].0
        }
    }
}

impl std::fmt::Display for PacketSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stride() {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(stride: usize, prefix: usize, count: usize) -> Vec<u8> {
        let mut buf = vec![0u8; stride * count];
        for i in 0..count {
            buf[i * stride + prefix] = TS_SYNC_BYTE;
        }
        buf
    }

    #[test]
    fn test_no_sync_byte() {
        assert_eq!(PacketSize::detect(&[0u8; 1000]), PacketSize::Unknown);
        assert_eq!(PacketSize::detect(&[]), PacketSize::Unknown);
    }

    #[test]
    fn test_single_sync_is_unknown() {
        let mut buf = vec![0u8; 300];
        buf[10] = TS_SYNC_BYTE;
        assert_eq!(PacketSize::detect(&buf), PacketSize::Unknown);
    }

    #[test]
    fn test_strides() {
        assert_eq!(PacketSize::detect(&stream(188, 0, 5)), PacketSize::Ts188);
        assert_eq!(PacketSize::detect(&stream(192, 4, 5)), PacketSize::M2ts192);
        assert_eq!(PacketSize::detect(&stream(204, 0, 5)), PacketSize::Dvb204);
    }

    #[test]
    fn test_three_syncs_188_apart() {
        let mut buf = vec![0u8; 188 * 2 + 1];
        buf[0] = TS_SYNC_BYTE;
        buf[188] = TS_SYNC_BYTE;
        buf[376] = TS_SYNC_BYTE;
        assert_eq!(PacketSize::detect(&buf), PacketSize::Ts188);
    }

    #[test]
    fn test_display() {
        assert_eq!(PacketSize::M2ts192.to_string(), "192");
        assert_eq!(PacketSize::Unknown.to_string(), "unknown");
    }
}
