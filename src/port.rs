//! Local port reservation for mock servers.
//!
//! A reservation keeps its socket bound until the server takes it over, so
//! no other process can grab the port in between. Ports handed out in this
//! process are also tracked so two servers never share one.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::OnceLock;

use parking_lot::Mutex;
use url::Url;

use crate::error::{MockServerError, Result};

const MAX_ATTEMPTS: usize = 16;

fn reserved_ports() -> &'static Mutex<HashSet<u16>> {
    static RESERVED: OnceLock<Mutex<HashSet<u16>>> = OnceLock::new();
    RESERVED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// An exclusively held local port and the base URL that points at it.
#[derive(Debug)]
pub struct PortReservation {
    addr: SocketAddr,
    base_url: Url,
    listener: Option<TcpListener>,
}

impl PortReservation {
    /// Reserve a free port on `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if no port could be bound.
    pub fn reserve(host: IpAddr) -> Result<Self> {
        let mut last_error = None;

        for _ in 0..MAX_ATTEMPTS {
            let listener = match TcpListener::bind(SocketAddr::new(host, 0)) {
                Ok(listener) => listener,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };
            let addr = listener.local_addr().map_err(MockServerError::Bind)?;

            if !reserved_ports().lock().insert(addr.port()) {
                tracing::debug!(port = addr.port(), "port already reserved in this process");
                continue;
            }

            let base_url = match Url::parse(&format!("http://{addr}/")) {
                Ok(url) => url,
                Err(err) => {
                    reserved_ports().lock().remove(&addr.port());
                    return Err(err.into());
                }
            };

            tracing::debug!(%addr, "reserved port");
            return Ok(Self {
                addr,
                base_url,
                listener: Some(listener),
            });
        }

        Err(MockServerError::Bind(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                "no unreserved port available",
            )
        })))
    }

    /// The reserved socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the form `http://<host>:<port>/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Take the bound socket so a server can listen on it.
    ///
    /// The port stays reserved until the reservation is dropped.
    pub fn take_listener(&mut self) -> Option<TcpListener> {
        self.listener.take()
    }
}

impl Drop for PortReservation {
    fn drop(&mut self) {
        reserved_ports().lock().remove(&self.addr.port());
        tracing::debug!(addr = %self.addr, "released port");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_reservations_are_distinct() {
        let first = PortReservation::reserve(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        let second = PortReservation::reserve(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();

        assert_ne!(first.addr().port(), second.addr().port());
        assert_ne!(first.base_url(), second.base_url());
    }

    #[test]
    fn test_base_url_format() {
        let reservation = PortReservation::reserve(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();

        assert_eq!(
            reservation.base_url().as_str(),
            format!("http://127.0.0.1:{}/", reservation.addr().port())
        );
    }

    #[test]
    fn test_listener_can_be_taken_once() {
        let mut reservation = PortReservation::reserve(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();

        assert!(reservation.take_listener().is_some());
        assert!(reservation.take_listener().is_none());
    }

    #[test]
    fn test_drop_releases_port() {
        let reservation = PortReservation::reserve(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        let port = reservation.addr().port();

        assert!(reserved_ports().lock().contains(&port));
        drop(reservation);
        assert!(!reserved_ports().lock().contains(&port));
    }
}
