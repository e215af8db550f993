//! Listening sockets.
//!
//! Sockets are bound before any serving task is spawned, so a bind failure
//! leaves nothing half started. `SO_REUSEADDR` lets a restart rebind the port
//! while connections from the previous run sit in TIME_WAIT.

use std::net::{SocketAddr, TcpListener};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::LISTEN_BACKLOG;
use crate::error::BindError;

/// Resolve `host:port`, taking the first address the resolver returns.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, BindError> {
    let address = format!("{host}:{port}");
    let first = tokio::net::lookup_host(address.clone())
        .await
        .map_err(|source| BindError::Resolve {
            address: address.clone(),
            source,
        })?
        .next();
    first.ok_or(BindError::NoAddress(address))
}

/// Create a non-blocking listener with `SO_REUSEADDR` set.
pub fn create_reusable_listener(addr: SocketAddr) -> Result<TcpListener, BindError> {
    bind(addr).map_err(|source| BindError::Bind { addr, source })
}

fn bind(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    // Tokio requires non-blocking sockets
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_localhost() {
        let addr = resolve("localhost", 8443).await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8443);
    }

    #[tokio::test]
    async fn test_resolve_literal_address() {
        let addr = resolve("127.0.0.1", 0).await.unwrap();
        assert_eq!(addr, SocketAddr::from(([127, 0, 0, 1], 0)));
    }

    #[tokio::test]
    async fn test_resolve_invalid_host_fails() {
        let err = resolve("not a host name", 443).await.unwrap_err();
        assert!(matches!(err, BindError::Resolve { .. } | BindError::NoAddress(_)));
    }

    #[test]
    fn test_port_can_be_rebound_after_close() {
        let listener = create_reusable_listener(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let rebound = create_reusable_listener(addr).unwrap();
        assert_eq!(rebound.local_addr().unwrap(), addr);
    }

    #[test]
    fn test_port_in_use_is_bind_error() {
        let listener = create_reusable_listener(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
        let addr = listener.local_addr().unwrap();

        let err = create_reusable_listener(addr).unwrap_err();
        assert!(matches!(err, BindError::Bind { addr: a, .. } if a == addr));
    }
}
