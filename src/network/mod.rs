use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use log::debug;
use socket2::{Domain, Protocol, Socket, Type};

/// Kernel receive buffer requested for bursty multicast feeds
const RECV_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Creates and configures a UDP socket for TS packet reception
/// Handles both unicast and multicast addresses
pub fn create_udp_socket(addr: SocketAddr) -> anyhow::Result<Socket> {
    let ip = match addr.ip() {
        IpAddr::V4(v4) => v4,
        _ => anyhow::bail!("only IPv4 is supported"),
    };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    // best effort, the kernel may clamp it
    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        debug!("receive buffer size not applied: {e}");
    }
    socket
        .bind(&addr.into())
        .with_context(|| format!("binding {addr}"))?;

    // Join multicast group if the address is multicast
    if ip.is_multicast() {
        let iface = Ipv4Addr::UNSPECIFIED; // default interface
        socket
            .join_multicast_v4(&ip, &iface)
            .with_context(|| format!("joining multicast group {ip}"))?;
        debug!("joined multicast group {ip}");
    }

    socket.set_nonblocking(true)?;
    Ok(socket)
}
