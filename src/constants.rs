//! Constants for MPEG-TS demultiplexing and PSI/SI reassembly

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_MAX_PAYLOAD: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;

/// Carrier strides: ISO, M2TS (4-byte timestamp prefix), DVB-ASI (16-byte FEC suffix)
pub const M2TS_PACKET_SIZE: usize = 192;
pub const DVB_ASI_PACKET_SIZE: usize = 204;

/// PID space
pub const PID_MAX: u16 = 0x1FFF;
pub const PID_COUNT: usize = PID_MAX as usize + 1;
pub const PID_NULL: u16 = 0x1FFF;
pub const CUSTOM_PID_FIRST: u16 = 0x0020;
pub const CUSTOM_PID_LAST: u16 = 0x1FFE;

/// Well-known PSI / SI PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_CAT: u16 = 0x0001;
pub const PID_TSDT: u16 = 0x0002;
pub const PID_IPMP: u16 = 0x0003;
pub const PID_ASI: u16 = 0x0004;
pub const PID_NIT: u16 = 0x0010;
pub const PID_SDT_BAT: u16 = 0x0011;
pub const PID_EIT: u16 = 0x0012;
pub const PID_RST: u16 = 0x0013;
pub const PID_TDT_TOT: u16 = 0x0014;
pub const PID_NET_SYNC: u16 = 0x0015;
pub const PID_RNT: u16 = 0x0016;
pub const PID_INBAND: u16 = 0x001C;
pub const PID_MEASUREMENT: u16 = 0x001D;
pub const PID_DIT: u16 = 0x001E;
pub const PID_SIT: u16 = 0x001F;

/// PIDs that get a Section filter when a demuxer is created
pub const SECTION_PIDS: &[u16] = &[
    PID_PAT,
    PID_CAT,
    PID_TSDT,
    PID_IPMP,
    PID_ASI,
    PID_NIT,
    PID_SDT_BAT,
    PID_EIT,
    PID_RST,
    PID_TDT_TOT,
    PID_NET_SYNC,
    PID_RNT,
    PID_INBAND,
    PID_MEASUREMENT,
    PID_DIT,
    PID_SIT,
];

/// Table ids
pub const TID_PAT: u8 = 0x00;
pub const TID_CAT: u8 = 0x01;
pub const TID_PMT: u8 = 0x02;
pub const TID_TSDT: u8 = 0x03;
pub const TID_METADATA: u8 = 0x06;
pub const TID_NIT_ACTUAL: u8 = 0x40;
pub const TID_NIT_OTHER: u8 = 0x41;
pub const TID_SDT_ACTUAL: u8 = 0x42;
pub const TID_SDT_OTHER: u8 = 0x46;
pub const TID_BAT: u8 = 0x4A;
pub const TID_EIT_PF_ACTUAL: u8 = 0x4E;
pub const TID_EIT_PF_OTHER: u8 = 0x4F;
pub const TID_EIT_SCHEDULE_FIRST: u8 = 0x50;
pub const TID_EIT_SCHEDULE_LAST: u8 = 0x6F;
pub const TID_TDT: u8 = 0x70;
pub const TID_RST: u8 = 0x71;
pub const TID_ST: u8 = 0x72;
pub const TID_TOT: u8 = 0x73;
pub const TID_DIT: u8 = 0x7E;
pub const TID_SIT: u8 = 0x7F;
pub const TID_STUFFING: u8 = 0xFF;

/// Section constants
pub const LONG_SECTION_HEAD_SIZE: usize = 8;
pub const SHORT_SECTION_HEAD_SIZE: usize = 3;
pub const MAX_SECTION_LENGTH: u16 = 1021;
pub const MIN_LONG_SECTION_LENGTH: u16 = 5;
pub const SECTION_CRC_SIZE: usize = 4;

/// PES constants
pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Accumulator growth starts at one packet payload
pub const ACCUMULATOR_INITIAL_CAPACITY: usize = TS_MAX_PAYLOAD;
pub const DESCRIPTOR_SET_INITIAL_CAPACITY: usize = 8;

/// Whether `pid` is allocated lazily on first sight.
pub fn is_custom_pid(pid: u16) -> bool {
    (CUSTOM_PID_FIRST..=CUSTOM_PID_LAST).contains(&pid)
}
