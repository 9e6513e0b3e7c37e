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

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::registry::UnitRegistry;
use super::spawner::HandlerExit;

/// Termination notice for one handler unit.
#[derive(Debug)]
pub struct UnitFinished {
    pub unit_id: u64,
    pub exit: HandlerExit,
}

/// Releases finished handler units from the registry.
///
/// Runs as its own task, fed by the watchers the dispatcher starts, so the
/// accept loop never waits on a handler. Notices that arrive together are
/// drained in one wakeup.
pub struct LifecycleReaper {
    registry: Arc<UnitRegistry>,
    finished_rx: mpsc::UnboundedReceiver<UnitFinished>,
}

impl LifecycleReaper {
    pub fn channel(registry: Arc<UnitRegistry>) -> (mpsc::UnboundedSender<UnitFinished>, Self) {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        (
            finished_tx,
            LifecycleReaper {
                registry,
                finished_rx,
            },
        )
    }

    /// Reaps until every notification sender is dropped and returns how many
    /// units were released.
    pub async fn run(mut self) -> usize {
        let mut reaped = 0;
        while let Some(first) = self.finished_rx.recv().await {
            let mut batch = 1;
            self.reap(first);
            while let Ok(next) = self.finished_rx.try_recv() {
                self.reap(next);
                batch += 1;
            }
            reaped += batch;
            debug!(
                "reaped {} handler unit(s), {} outstanding",
                batch,
                self.registry.outstanding()
            );
        }
        debug!("reaper exit loop, {} unit(s) reaped", reaped);
        reaped
    }

    fn reap(&self, finished: UnitFinished) {
        let UnitFinished { unit_id, exit } = finished;
        match self.registry.release(unit_id) {
            Some(record) => info!(
                "handler unit {} for {} finished after {:?}: {}",
                unit_id,
                record.peer,
                record.elapsed(),
                exit
            ),
            None => warn!("handler unit {} finished but was not tracked: {}", unit_id, exit),
        }
    }
}
