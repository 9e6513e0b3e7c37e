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

use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::resolver::{Candidate, CandidateIter};
use crate::{AppError, AppResult};

/// Opens a stream to one candidate.
pub trait Connect: Send + Sync {
    fn connect(&self, candidate: Candidate) -> impl Future<Output = io::Result<TcpStream>> + Send;
}

/// Plain TCP connect without any timeout; a silent peer stalls the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    async fn connect(&self, candidate: Candidate) -> io::Result<TcpStream> {
        let socket = candidate.socket()?;
        // a failed connect drops, and thereby closes, the socket
        socket.connect(candidate.addr()).await
    }
}

/// Walks the candidates in order and keeps the first connection that succeeds.
#[derive(Debug, Default)]
pub struct ConnectionEstablisher<C = TcpConnector> {
    connector: C,
}

impl<C: Connect> ConnectionEstablisher<C> {
    pub fn new(connector: C) -> Self {
        ConnectionEstablisher { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the live stream together with the address it is connected to.
    ///
    /// Every candidate is tried at most once, without delay between attempts.
    pub async fn establish(&self, candidates: CandidateIter) -> AppResult<(TcpStream, SocketAddr)> {
        let mut attempted = 0;
        for candidate in candidates {
            attempted += 1;
            debug!("client: trying {}", candidate);
            match self.connector.connect(candidate).await {
                Ok(stream) => return Ok((stream, candidate.addr())),
                Err(e) => warn!("client: connect {}: {}", candidate, e),
            }
        }
        Err(AppError::Connect(format!(
            "all {} candidate address(es) failed",
            attempted
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use tokio::net::TcpListener;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;
    use crate::network::{AddressResolver, Intent, StaticResolver};

    /// Refuses the listed addresses without touching the network.
    struct ScriptedConnector {
        refuse: HashSet<SocketAddr>,
        attempts: Mutex<Vec<SocketAddr>>,
    }

    impl ScriptedConnector {
        fn new(refuse: &[SocketAddr]) -> Self {
            ScriptedConnector {
                refuse: refuse.iter().copied().collect(),
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn attempts(&self) -> Vec<SocketAddr> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl Connect for ScriptedConnector {
        async fn connect(&self, candidate: Candidate) -> io::Result<TcpStream> {
            let addr = candidate.addr();
            self.attempts.lock().unwrap().push(addr);
            if self.refuse.contains(&addr) {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            TcpStream::connect(addr).await
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_fallback() -> AppResult<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let a: SocketAddr = "192.0.2.1:6543".parse().unwrap();
        let b = listener.local_addr()?;
        let c: SocketAddr = "192.0.2.3:6543".parse().unwrap();

        let candidates = StaticResolver::new(vec![a, b, c])
            .resolve(Some("board"), "6543", Intent::Connect)
            .await?;
        let establisher = ConnectionEstablisher::new(ScriptedConnector::new(&[a, c]));
        let (stream, peer) = establisher.establish(candidates).await?;

        assert_eq!(peer, b);
        assert_eq!(stream.peer_addr()?, b);
        assert_eq!(establisher.connector().attempts(), vec![a, b]);
        Ok(())
    }

    #[tokio::test]
    async fn test_all_candidates_fail() -> AppResult<()> {
        let addrs: Vec<SocketAddr> = vec![
            "192.0.2.1:1".parse().unwrap(),
            "[2001:db8::1]:1".parse().unwrap(),
            "192.0.2.2:1".parse().unwrap(),
        ];
        let candidates = StaticResolver::new(addrs.clone())
            .resolve(Some("board"), "1", Intent::Connect)
            .await?;
        let establisher = ConnectionEstablisher::new(ScriptedConnector::new(&addrs));

        let result = establisher.establish(candidates).await;
        assert!(matches!(result, Err(AppError::Connect(_))));
        assert_eq!(establisher.connector().attempts(), addrs);
        Ok(())
    }

    #[tokio::test]
    async fn test_tcp_connector_refused_then_ok() -> AppResult<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let live = listener.local_addr()?;
        let dead = {
            let closed = TcpListener::bind("127.0.0.1:0").await?;
            closed.local_addr()?
        };
        let candidates = StaticResolver::new(vec![dead, live])
            .resolve(Some("127.0.0.1"), "0", Intent::Connect)
            .await?;
        let (_stream, peer) = ConnectionEstablisher::new(TcpConnector)
            .establish(candidates)
            .await?;
        assert_eq!(peer, live);
        Ok(())
    }

    /// Counts WARN events emitted on the current thread.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_each_failed_candidate_logged_once() -> AppResult<()> {
        let mut dead = Vec::new();
        for _ in 0..2 {
            let closed = TcpListener::bind("127.0.0.1:0").await?;
            dead.push(closed.local_addr()?);
        }
        let warnings = Arc::new(AtomicUsize::new(0));
        let _subscriber = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(WarnCounter(warnings.clone())),
        );

        let candidates = StaticResolver::new(dead.clone())
            .resolve(Some("127.0.0.1"), "0", Intent::Connect)
            .await?;
        let result = ConnectionEstablisher::new(TcpConnector)
            .establish(candidates)
            .await;
        assert!(matches!(result, Err(AppError::Connect(_))));
        assert_eq!(warnings.load(Ordering::SeqCst), dead.len());
        Ok(())
    }
}
