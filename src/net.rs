use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Open a blocking UDP socket connected to `target`.
///
/// Connecting filters out datagrams from any other source and lets the kernel
/// surface ICMP port-unreachable as `ConnectionRefused` on the next receive.
pub fn create_query_socket(target: SocketAddr, timeout: Duration) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(target), Type::DGRAM, Some(Protocol::UDP))?;

    // Ephemeral local port on the matching family
    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    socket.bind(&local.into())?;

    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;
    socket.connect(&target.into())?;

    Ok(socket.into())
}

/// Bind a UDP socket for answering queries, with address reuse so a restarted
/// responder can grab the port immediately.
pub fn create_listen_socket(bind: SocketAddr, poll_interval: Duration) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(bind), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&bind.into())?;

    // Short read timeout so the serve loop can notice a shutdown request
    socket.set_read_timeout(Some(poll_interval))?;

    Ok(socket.into())
}
