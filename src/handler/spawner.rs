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

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, error};

use crate::{AppError, AppResult, HandlerConfig};

/// How a handler unit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerExit {
    /// A handler process terminated with this status.
    Exited(ExitStatus),
    /// An in-process handler returned normally.
    Completed,
    /// An in-process handler returned an error, or waiting on it failed.
    Failed(String),
    Panicked(String),
}

impl fmt::Display for HandlerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerExit::Exited(status) => write!(f, "{}", status),
            HandlerExit::Completed => write!(f, "completed"),
            HandlerExit::Failed(cause) => write!(f, "failed: {}", cause),
            HandlerExit::Panicked(message) => write!(f, "panicked: {}", message),
        }
    }
}

/// Resolves once the unit has terminated.
pub type HandlerUnit = Pin<Box<dyn Future<Output = HandlerExit> + Send + 'static>>;

/// Starts an isolated unit that takes sole ownership of one connection.
///
/// The stream is moved in; when spawning fails it is dropped, which closes
/// the connection.
pub trait HandlerSpawner: Send + Sync + 'static {
    fn spawn(&self, stream: TcpStream, peer: SocketAddr) -> AppResult<HandlerUnit>;
}

/// Runs an external program with the connection as its stdin and stdout.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        ProcessSpawner {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &HandlerConfig) -> Self {
        ProcessSpawner::new(&config.command, config.args.clone())
    }
}

impl HandlerSpawner for ProcessSpawner {
    fn spawn(&self, stream: TcpStream, peer: SocketAddr) -> AppResult<HandlerUnit> {
        // the child expects ordinary blocking descriptors
        let socket = stream.into_std()?;
        socket.set_nonblocking(false)?;
        let output = socket.try_clone()?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::from(OwnedFd::from(socket)))
            .stdout(Stdio::from(OwnedFd::from(output)))
            .stderr(Stdio::inherit());
        let spawned = command.spawn();
        // closes the server's copies of the connection
        drop(command);

        let mut child = spawned
            .map_err(|e| AppError::Dispatch(format!("{}: {}", self.program.display(), e)))?;
        debug!(
            "handler {} pid {:?} serving {}",
            self.program.display(),
            child.id(),
            peer
        );

        Ok(Box::pin(async move {
            match child.wait().await {
                Ok(status) => HandlerExit::Exited(status),
                Err(e) => HandlerExit::Failed(format!("wait: {}", e)),
            }
        }))
    }
}

/// Runs an async closure owning the connection as its own tokio task.
pub struct TaskSpawner<F> {
    handler: F,
}

impl<F, Fut> TaskSpawner<F>
where
    F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    pub fn new(handler: F) -> Self {
        TaskSpawner { handler }
    }
}

fn get_type_name<T>(_: &T) -> &'static str {
    type_name::<T>()
}

impl<F, Fut> HandlerSpawner for TaskSpawner<F>
where
    F: Fn(TcpStream, SocketAddr) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    fn spawn(&self, stream: TcpStream, peer: SocketAddr) -> AppResult<HandlerUnit> {
        let handle = tokio::spawn((self.handler)(stream, peer));
        Ok(Box::pin(async move {
            match handle.await {
                Ok(Ok(())) => HandlerExit::Completed,
                Ok(Err(e)) => HandlerExit::Failed(e.to_string()),
                Err(join_error) if join_error.is_panic() => {
                    let payload = join_error.into_panic();
                    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
                        message.to_string()
                    } else if let Some(message) = payload.downcast_ref::<String>() {
                        message.clone()
                    } else {
                        format!("unknown payload type {}", get_type_name(&payload))
                    };
                    error!("handler task for {} panicked: {}", peer, message);
                    HandlerExit::Panicked(message)
                }
                Err(join_error) => HandlerExit::Failed(join_error.to_string()),
            }
        }))
    }
}
