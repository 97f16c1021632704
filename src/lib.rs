// src/lib.rs
//! MPEG-TS demultiplexer and PSI/SI table reassembler.
//!
//! Feed raw transport stream bytes to a [`Demuxer`]; completed tables are
//! available by table id through [`Demuxer::table`].

pub mod inspector {
    pub use crate::types::{Options, Source};

    /// Async entry-point; returns when the source is drained or stopped (Ctrl-C or socket error)
    pub async fn run(opts: Options) -> anyhow::Result<()> {
        crate::session::run(opts).await
    }
}

pub mod config;
pub mod constants;
pub mod demux;
pub mod error;
pub mod network;
pub mod packet;
pub mod psi;
pub mod reader;
pub mod report;
pub mod session;
pub mod stats;
pub mod types;

pub use config::{DemuxConfig, ParseLimits};
pub use demux::detect::PacketSize;
pub use demux::filter::{ContinuityStatus, Filter, FilterKind, SectionState};
pub use demux::pes::{PesHeader, PesUnit};
pub use demux::{Demuxer, PacketRecord};
pub use error::{DemuxError, ErrorKind, Result};
pub use packet::{AdaptationField, AdaptationFieldControl, Packet, ScramblingControl};
pub use psi::{Descriptor, DescriptorSet, Section, SectionHead, Table, TableData, TableStore};
pub use report::Reporter;
