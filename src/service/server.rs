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
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::handler::{HandlerDispatcher, HandlerSpawner, LifecycleReaper, ProcessSpawner, UnitRegistry};
use crate::network::{AddressResolver, ConnectionAcceptor, Intent, Listener, SystemResolver};
use crate::{AppResult, NetworkConfig, ServerConfig};

use super::Shutdown;

/// A bound, listening server that has not started accepting yet.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    registry: Arc<UnitRegistry>,
}

impl Server {
    /// Resolves the passive address and acquires the listening socket.
    /// Every failure here is fatal to the server.
    pub async fn bind<R: AddressResolver>(resolver: &R, network: &NetworkConfig) -> AppResult<Server> {
        let port = network.port.to_string();
        let candidates = resolver
            .resolve(network.bind_address.as_deref(), &port, Intent::Bind)
            .await?;
        let listener = Listener::new(network.backlog).bind(candidates)?;
        Ok(Server {
            listener,
            registry: Arc::new(UnitRegistry::default()),
        })
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handler units started by this server and not reaped yet.
    pub fn registry(&self) -> Arc<UnitRegistry> {
        self.registry.clone()
    }

    /// Accepts connections and hands them to `spawner` until `shutdown` fires.
    ///
    /// The reaper runs as a separate task for the whole lifetime of the
    /// server; handler units still running when this returns keep running
    /// and are reaped as long as the runtime is alive.
    #[tracing::instrument(skip_all)]
    pub async fn run(self, spawner: Arc<dyn HandlerSpawner>, shutdown: Shutdown) {
        let Server { listener, registry } = self;
        let (finished_tx, reaper) = LifecycleReaper::channel(registry.clone());
        tokio::spawn(reaper.run());
        let dispatcher = HandlerDispatcher::new(spawner, registry.clone(), finished_tx);

        let mut acceptor = ConnectionAcceptor::new(listener);
        acceptor.run(&dispatcher, &shutdown).await;

        info!(
            "server: stopped accepting, {} handler unit(s) still running",
            registry.outstanding()
        );
    }
}

/// Runs the server described by `config` until Ctrl-C.
pub async fn serve(config: &ServerConfig) -> AppResult<()> {
    let server = Server::bind(&SystemResolver, &config.network).await?;
    let spawner: Arc<dyn HandlerSpawner> = Arc::new(ProcessSpawner::from_config(&config.handler));
    debug!(
        "handler command: {} {:?}",
        config.handler.command, config.handler.args
    );

    let shutdown = Shutdown::new();
    shutdown.forward_ctrl_c();

    server.run(spawner, shutdown).await;
    Ok(())
}
