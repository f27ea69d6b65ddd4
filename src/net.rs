//! Local IP discovery.

use std::net::{IpAddr, UdpSocket};

use crate::config::{LOCAL_IP_ROUTE_TARGET, LOOPBACK_IP};

/// Best-effort address of the interface used for outbound traffic.
///
/// Connecting a UDP socket only selects a route; no packet is sent. Falls back
/// to `127.0.0.1` when there is no route or the platform refuses the socket.
pub fn discover_local_ip() -> IpAddr {
    match route_local_ip(LOCAL_IP_ROUTE_TARGET) {
        Ok(ip) if !ip.is_unspecified() => ip,
        Ok(ip) => {
            tracing::debug!(%ip, "Route lookup returned unspecified address, using loopback");
            LOOPBACK_IP
        }
        Err(e) => {
            tracing::debug!(error = %e, "Local IP discovery failed, using loopback");
            LOOPBACK_IP
        }
    }
}

fn route_local_ip(target: &str) -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(target)?;
    Ok(socket.local_addr()?.ip())
}
