use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::network::{
    encode, AddressResolver, Connect, ConnectionEstablisher, Intent, Posting, SystemResolver,
    TcpConnector,
};
use crate::{AppError, AppResult};

/// Posts to a bulletin board server: resolve, connect, send, close.
///
/// Every step blocks until it completes; there are no timeouts.
#[derive(Debug, Default)]
pub struct Client<R = SystemResolver, C = TcpConnector> {
    resolver: R,
    establisher: ConnectionEstablisher<C>,
}

impl<R: AddressResolver, C: Connect> Client<R, C> {
    pub fn new(resolver: R, connector: C) -> Self {
        Client {
            resolver,
            establisher: ConnectionEstablisher::new(connector),
        }
    }

    /// Connects to the first reachable address of `server`:`port`.
    pub async fn connect(&self, server: &str, port: &str) -> AppResult<Session> {
        debug!("client: getting address info for {}:{}", server, port);
        let candidates = self.resolver.resolve(Some(server), port, Intent::Connect).await?;
        debug!("client: {} candidate address(es)", candidates.len());
        let (stream, peer) = self.establisher.establish(candidates).await?;
        Ok(Session { stream, peer })
    }
}

/// A connection carrying exactly one posting.
#[derive(Debug)]
pub struct Session {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Session {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Writes the whole encoded posting, then closes the connection.
    /// Returns the number of bytes sent.
    pub async fn send(mut self, posting: &Posting) -> AppResult<usize> {
        let wire = encode(posting);
        self.stream
            .write_all(&wire)
            .await
            .map_err(|e| AppError::Send(e.to_string()))?;
        self.stream
            .shutdown()
            .await
            .map_err(|e| AppError::Send(e.to_string()))?;
        debug!("client: sent {} bytes to {}", wire.len(), self.peer);
        Ok(wire.len())
    }
}
