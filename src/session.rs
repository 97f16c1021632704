//! Inspector session: byte source -> Demuxer -> JSON report.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use tokio::net::UdpSocket;

use crate::config::DemuxConfig;
use crate::demux::Demuxer;
use crate::error::{DemuxError, Result};
use crate::network::create_udp_socket;
use crate::report::Reporter;
use crate::types::{Options, Source};

const DATAGRAM_BUFFER_SIZE: usize = 64 * 1024;

/// Async entry-point; returns when the file is consumed, or when stopped
/// (Ctrl-C or socket error) for UDP.
pub async fn run(opts: Options) -> anyhow::Result<()> {
    match opts.source {
        Source::File(path) => {
            let demux = inspect_file(&path, opts.config).await?;
            println!("{}", Reporter::generate_json_report(&demux));
            Ok(())
        }
        Source::Udp(addr) => run_udp(addr, opts.refresh_secs, opts.config).await,
    }
}

/// Read a whole capture file.
pub async fn read_source(path: &Path) -> Result<Vec<u8>> {
    let data = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DemuxError::FileNotFound(path.to_path_buf()),
        _ => DemuxError::Io(e),
    })?;
    if data.is_empty() {
        return Err(DemuxError::EndOfData);
    }
    Ok(data)
}

/// Demultiplex a capture file in one pass.
pub async fn inspect_file(path: &Path, config: DemuxConfig) -> anyhow::Result<Demuxer> {
    let data = read_source(path).await?;
    info!("{}: {} bytes", path.display(), data.len());
    let mut demux = Demuxer::new(config)?;
    demux
        .add_buffer(&data)
        .with_context(|| format!("demultiplexing {}", path.display()))?;
    Ok(demux)
}

async fn run_udp(addr: SocketAddr, refresh_secs: u64, mut config: DemuxConfig) -> anyhow::Result<()> {
    // sections may straddle datagrams
    config.flush_on_buffer_end = false;
    let mut demux = Demuxer::new(config)?;

    let socket = create_udp_socket(addr)?;
    let sock = UdpSocket::from_std(socket.into())?;
    info!("listening on {addr}");

    let mut buf = vec![0u8; DATAGRAM_BUFFER_SIZE];
    let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            received = sock.recv(&mut buf) => {
                let n = received?;
                if n == 0 {
                    continue;
                }
                if let Err(e) = demux.add_buffer(&buf[..n]) {
                    warn!("datagram of {n} bytes rejected: {e}");
                }
            }
            _ = ticker.tick() => {
                println!("{}", Reporter::generate_json_report(&demux));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, final report");
                demux.flush_all()?;
                println!("{}", Reporter::generate_json_report(&demux));
                return Ok(());
            }
        }
    }
}
