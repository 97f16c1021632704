use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mpegts_demux::inspector::{Options, Source, run};
use mpegts_demux::{DemuxConfig, DemuxError};

#[derive(Parser)]
#[clap(about = "Demultiplex an MPEG-TS capture or UDP feed and print its PSI/SI tables")]
struct Opt {
    /// Transport stream file to read (188, 192 or 204 byte packets)
    #[clap(long, short, conflicts_with = "addr")]
    input: Option<PathBuf>,

    /// UDP socket to bind + listen (IPv4, unicast or multicast)
    #[clap(long)]
    addr: Option<String>,

    /// Refresh interval for the JSON snapshot (UDP)
    #[clap(long, default_value_t = 2)]
    refresh: u64,

    /// Demuxer configuration as JSON
    #[clap(long)]
    config: Option<PathBuf>,

    /// Keep decoded packets in memory
    #[clap(long, default_value_t = false)]
    store_packets: bool,

    /// Drop sections whose CRC-32 does not match
    #[clap(long, default_value_t = false)]
    verify_crc: bool,

    /// Debug logging unless RUST_LOG says otherwise
    #[clap(long, short, default_value_t = false)]
    verbose: bool,
}

fn load_config(opt: &Opt) -> anyhow::Result<DemuxConfig> {
    let mut config = match &opt.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => DemuxConfig::default(),
    };
    config.store_parsed_packets |= opt.store_packets;
    config.verify_crc |= opt.verify_crc;
    Ok(config)
}

async fn start(opt: Opt) -> anyhow::Result<()> {
    let config = load_config(&opt)?;
    let source = match (opt.input, opt.addr) {
        (Some(path), _) => Source::File(path),
        (None, Some(addr)) => Source::Udp(addr.parse()?),
        (None, None) => Source::Udp("239.1.1.2:1234".parse()?),
    };
    run(Options {
        source,
        refresh_secs: opt.refresh,
        config,
    })
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let opt = Opt::parse();
    let level = if opt.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match start(opt).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.chain().find_map(|c| c.downcast_ref::<DemuxError>()) {
                Some(demux_err) => eprintln!("{}: {e:#}", demux_err.kind()),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
