//! Address resolution
//!
//! Turns a host/service pair into the ordered list of endpoints a caller
//! should try, stopping at the first one that works. The order is whatever
//! the system resolver reports and is never rearranged here.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::TcpSocket;

use crate::{AppError, AppResult};

/// What the resolved endpoints will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Connect,
    /// Passive open; an absent host means the wildcard address.
    Bind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Inet,
    Inet6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Inet => write!(f, "AF_INET"),
            Family::Inet6 => write!(f, "AF_INET6"),
        }
    }
}

/// One resolved endpoint: a TCP stream socket of `family` at `addr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    addr: SocketAddr,
}

impl Candidate {
    pub fn new(addr: SocketAddr) -> Self {
        Candidate { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn family(&self) -> Family {
        match self.addr {
            SocketAddr::V4(_) => Family::Inet,
            SocketAddr::V6(_) => Family::Inet6,
        }
    }

    /// Creates an unbound, unconnected stream socket matching the candidate's family.
    pub fn socket(&self) -> io::Result<TcpSocket> {
        match self.family() {
            Family::Inet => TcpSocket::new_v4(),
            Family::Inet6 => TcpSocket::new_v6(),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.addr, self.family())
    }
}

/// Finite, single-pass sequence of candidates in resolver order.
#[derive(Debug)]
pub struct CandidateIter {
    inner: std::vec::IntoIter<Candidate>,
}

impl CandidateIter {
    fn new(candidates: Vec<Candidate>) -> Self {
        CandidateIter {
            inner: candidates.into_iter(),
        }
    }
}

impl Iterator for CandidateIter {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for CandidateIter {}

pub trait AddressResolver: Send + Sync {
    /// Resolves `host`/`service` into at least one candidate, or fails with
    /// [`AppError::Resolution`].
    fn resolve(
        &self,
        host: Option<&str>,
        service: &str,
        intent: Intent,
    ) -> impl Future<Output = AppResult<CandidateIter>> + Send;
}

/// Resolver backed by the operating system's name service.
///
/// The service must be a numeric port; names such as `http` are not looked
/// up and fail with [`AppError::Resolution`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl AddressResolver for SystemResolver {
    async fn resolve(
        &self,
        host: Option<&str>,
        service: &str,
        intent: Intent,
    ) -> AppResult<CandidateIter> {
        let port = parse_port(service)?;
        let addrs: Vec<SocketAddr> = match host {
            Some(host) => tokio::net::lookup_host((host, port))
                .await
                .map_err(|e| AppError::Resolution(format!("{}: {}", host, e)))?
                .collect(),
            None => unspecified_host(port, intent),
        };
        if addrs.is_empty() {
            return Err(AppError::Resolution(format!(
                "no address associated with {}:{}",
                host.unwrap_or("*"),
                service
            )));
        }
        Ok(CandidateIter::new(addrs.into_iter().map(Candidate::new).collect()))
    }
}

/// Always hands out the same candidates, whatever is asked for.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addrs: Vec<SocketAddr>,
}

impl StaticResolver {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        StaticResolver { addrs }
    }
}

impl AddressResolver for StaticResolver {
    async fn resolve(
        &self,
        host: Option<&str>,
        service: &str,
        _intent: Intent,
    ) -> AppResult<CandidateIter> {
        if self.addrs.is_empty() {
            return Err(AppError::Resolution(format!(
                "no address associated with {}:{}",
                host.unwrap_or("*"),
                service
            )));
        }
        Ok(CandidateIter::new(
            self.addrs.iter().copied().map(Candidate::new).collect(),
        ))
    }
}

fn parse_port(service: &str) -> AppResult<u16> {
    service
        .trim()
        .parse::<u16>()
        .map_err(|_| AppError::Resolution(format!("invalid port: {:?}", service)))
}

// Same order getaddrinfo(3) reports on Linux for a null node.
fn unspecified_host(port: u16, intent: Intent) -> Vec<SocketAddr> {
    let (v4, v6) = match intent {
        Intent::Bind => (
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        ),
        Intent::Connect => (
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
        ),
    };
    vec![SocketAddr::new(v4, port), SocketAddr::new(v6, port)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_numeric_ipv4() -> AppResult<()> {
        let candidates: Vec<_> = SystemResolver
            .resolve(Some("127.0.0.1"), "6543", Intent::Connect)
            .await?
            .collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].addr(), "127.0.0.1:6543".parse().unwrap());
        assert_eq!(candidates[0].family(), Family::Inet);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_bind_wildcard() -> AppResult<()> {
        let candidates: Vec<_> = SystemResolver
            .resolve(None, "8080", Intent::Bind)
            .await?
            .map(|c| c.addr())
            .collect();
        assert_eq!(
            candidates,
            vec![
                "0.0.0.0:8080".parse::<SocketAddr>().unwrap(),
                "[::]:8080".parse::<SocketAddr>().unwrap(),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_order_is_stable() -> AppResult<()> {
        let resolver = StaticResolver::new(vec![
            "[::1]:7000".parse().unwrap(),
            "127.0.0.1:7000".parse().unwrap(),
            "10.0.0.1:7000".parse().unwrap(),
        ]);
        let first: Vec<_> = resolver
            .resolve(Some("board"), "7000", Intent::Connect)
            .await?
            .collect();
        let second: Vec<_> = resolver
            .resolve(Some("board"), "7000", Intent::Connect)
            .await?
            .collect();
        assert_eq!(first, second);
        assert_eq!(first[0].family(), Family::Inet6);

        let system_first: Vec<_> = SystemResolver
            .resolve(Some("127.0.0.1"), "7000", Intent::Connect)
            .await?
            .collect();
        let system_second: Vec<_> = SystemResolver
            .resolve(Some("127.0.0.1"), "7000", Intent::Connect)
            .await?
            .collect();
        assert_eq!(system_first, system_second);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_port() {
        let result = SystemResolver
            .resolve(Some("127.0.0.1"), "70000", Intent::Connect)
            .await;
        assert!(matches!(result, Err(AppError::Resolution(_))));
        let result = SystemResolver.resolve(None, "http", Intent::Bind).await;
        assert!(matches!(result, Err(AppError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_empty_resolution_is_an_error() {
        let result = StaticResolver::default()
            .resolve(Some("board"), "7000", Intent::Connect)
            .await;
        assert!(matches!(result, Err(AppError::Resolution(_))));
    }

    #[test]
    fn test_candidate_display() {
        let candidate = Candidate::new("[::1]:80".parse().unwrap());
        assert_eq!(candidate.to_string(), "[::1]:80 (AF_INET6)");
    }
}
