// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::handler::HandlerDispatcher;
use crate::service::Shutdown;
use crate::AppError;

/// Source of inbound connections.
pub trait Accept: Send {
    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Accept for TcpListener {
    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// The server's steady state: wait for a peer, hand it off, repeat.
#[derive(Debug)]
pub struct ConnectionAcceptor<A = TcpListener> {
    source: A,
}

impl<A: Accept> ConnectionAcceptor<A> {
    pub fn new(source: A) -> Self {
        ConnectionAcceptor { source }
    }

    /// Waits for the next connection. Failed accepts are logged and skipped,
    /// so this only returns once a peer is actually connected.
    pub async fn next_connection(&mut self) -> (TcpStream, SocketAddr) {
        loop {
            match self.source.accept().await {
                Ok((stream, peer)) => {
                    info!("server: got connection from {}", peer.ip());
                    return (stream, peer);
                }
                Err(e) => {
                    let err = AppError::Accept(e.to_string());
                    warn!(cause = %err, "server: accept failed, continuing");
                }
            }
        }
    }

    /// Accepts and dispatches until `shutdown` fires. Dispatch failures only
    /// cost the connection they happened on.
    pub async fn run(&mut self, dispatcher: &HandlerDispatcher, shutdown: &Shutdown) {
        info!("server: waiting for connections...");
        let stopped = shutdown.wait();
        tokio::pin!(stopped);
        loop {
            let (stream, peer) = tokio::select! {
                accepted = self.next_connection() => accepted,
                _ = &mut stopped => {
                    debug!("acceptor exit loop after recv shutdown signal");
                    break;
                }
            };
            if let Err(err) = dispatcher.dispatch(stream, peer) {
                warn!(cause = %err, "server: dropped connection from {}", peer);
            }
        }
    }
}
