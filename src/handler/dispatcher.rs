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

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::reaper::UnitFinished;
use super::registry::{UnitRecord, UnitRegistry};
use super::spawner::HandlerSpawner;
use crate::{AppError, AppResult};

/// Hands each accepted connection to a freshly spawned handler unit.
///
/// The stream is moved into the spawner, so once `dispatch` returns the
/// acceptor no longer holds any handle to it. Each unit gets a watcher task
/// that reports its termination to the reaper.
pub struct HandlerDispatcher {
    spawner: Arc<dyn HandlerSpawner>,
    registry: Arc<UnitRegistry>,
    finished_tx: mpsc::UnboundedSender<UnitFinished>,
    next_unit_id: AtomicU64,
}

impl HandlerDispatcher {
    pub fn new(
        spawner: Arc<dyn HandlerSpawner>,
        registry: Arc<UnitRegistry>,
        finished_tx: mpsc::UnboundedSender<UnitFinished>,
    ) -> Self {
        HandlerDispatcher {
            spawner,
            registry,
            finished_tx,
            next_unit_id: AtomicU64::new(1),
        }
    }

    /// Returns the id of the spawned unit. A failed spawn closes the
    /// connection and is reported as [`AppError::Dispatch`].
    pub fn dispatch(&self, stream: TcpStream, peer: SocketAddr) -> AppResult<u64> {
        let unit_id = self.next_unit_id.fetch_add(1, Ordering::Relaxed);
        // tracked before the unit runs, so it can never finish untracked
        self.registry.track(unit_id, UnitRecord::new(peer));
        let unit = match self.spawner.spawn(stream, peer) {
            Ok(unit) => unit,
            Err(e) => {
                self.registry.release(unit_id);
                error!("server: handler for {} not started: {}", peer, e);
                return Err(match e {
                    AppError::Dispatch(_) => e,
                    other => AppError::Dispatch(other.to_string()),
                });
            }
        };
        debug!("handler unit {} started for {}", unit_id, peer);

        let finished_tx = self.finished_tx.clone();
        tokio::spawn(async move {
            let exit = unit.await;
            if finished_tx.send(UnitFinished { unit_id, exit }).is_err() {
                error!("reaper gone, handler unit {} left unaccounted", unit_id);
            }
        });
        Ok(unit_id)
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::handler::{HandlerExit, HandlerUnit, TaskSpawner};

    struct RefusingSpawner;

    impl HandlerSpawner for RefusingSpawner {
        fn spawn(&self, _stream: TcpStream, _peer: SocketAddr) -> AppResult<HandlerUnit> {
            Err(AppError::IoError(std::io::Error::from(
                std::io::ErrorKind::WouldBlock,
            )))
        }
    }

    async fn accepted() -> AppResult<(TcpStream, TcpStream, SocketAddr)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let client = TcpStream::connect(listener.local_addr()?).await?;
        let (stream, peer) = listener.accept().await?;
        Ok((client, stream, peer))
    }

    #[tokio::test]
    async fn test_dispatch_tracks_and_reports() -> AppResult<()> {
        let registry = Arc::new(UnitRegistry::default());
        let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
        let spawner = TaskSpawner::new(|_stream, _peer| async { Ok::<(), AppError>(()) });
        let dispatcher = HandlerDispatcher::new(Arc::new(spawner), registry.clone(), finished_tx);

        let (_client, stream, peer) = accepted().await?;
        let unit_id = dispatcher.dispatch(stream, peer)?;
        assert!(registry.is_tracked(unit_id));

        let finished = finished_rx.recv().await.unwrap();
        assert_eq!(finished.unit_id, unit_id);
        assert_eq!(finished.exit, HandlerExit::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_unit_ids_are_per_dispatcher() -> AppResult<()> {
        let (finished_tx, _finished_rx) = mpsc::unbounded_channel();
        let spawner: Arc<dyn HandlerSpawner> =
            Arc::new(TaskSpawner::new(|_stream, _peer| async { Ok::<(), AppError>(()) }));
        let first = HandlerDispatcher::new(spawner.clone(), Arc::default(), finished_tx.clone());
        let second = HandlerDispatcher::new(spawner, Arc::default(), finished_tx);

        let mut ids = Vec::new();
        for dispatcher in [&first, &first, &second] {
            let (_client, stream, peer) = accepted().await?;
            ids.push(dispatcher.dispatch(stream, peer)?);
        }
        assert_eq!(ids, vec![1, 2, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_spawn_failure_is_contained() -> AppResult<()> {
        use tokio::io::AsyncReadExt;

        let registry = Arc::new(UnitRegistry::default());
        let (finished_tx, _finished_rx) = mpsc::unbounded_channel();
        let dispatcher = HandlerDispatcher::new(Arc::new(RefusingSpawner), registry.clone(), finished_tx);

        let (mut client, stream, peer) = accepted().await?;
        let result = dispatcher.dispatch(stream, peer);
        assert!(matches!(result, Err(AppError::Dispatch(_))));
        assert_eq!(registry.outstanding(), 0);

        let mut rest = Vec::new();
        assert_eq!(client.read_to_end(&mut rest).await?, 0);
        Ok(())
    }
}
