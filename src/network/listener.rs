use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use super::resolver::CandidateIter;
use crate::{AppError, AppResult};

/// Acquires the server's passive socket from the first bindable candidate.
#[derive(Debug, Clone, Copy)]
pub struct Listener {
    backlog: u32,
}

impl Listener {
    pub fn new(backlog: u32) -> Self {
        Listener { backlog }
    }

    /// Must be called from within a tokio runtime.
    pub fn bind(&self, candidates: CandidateIter) -> AppResult<TcpListener> {
        let mut last_error = None;
        let mut bound = None;
        for candidate in candidates {
            let socket = match candidate.socket() {
                Ok(socket) => socket,
                Err(e) => {
                    warn!("server: socket {}: {}", candidate, e);
                    last_error = Some(e);
                    continue;
                }
            };
            if let Err(e) = socket.set_reuseaddr(true) {
                warn!("server: setsockopt SO_REUSEADDR {}: {}", candidate, e);
                last_error = Some(e);
                continue;
            }
            match socket.bind(candidate.addr()) {
                Ok(()) => {
                    debug!("server: bound {}", candidate);
                    bound = Some(socket);
                    break;
                }
                Err(e) => {
                    warn!("server: bind {}: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        let socket = bound.ok_or_else(|| {
            AppError::Bind(last_error.map_or_else(
                || "no candidate address".to_string(),
                |e| e.to_string(),
            ))
        })?;
        let listener = socket
            .listen(self.backlog)
            .map_err(|e| AppError::Listen(e.to_string()))?;
        info!(
            "server: listening on {} (backlog {})",
            listener.local_addr()?,
            self.backlog
        );
        Ok(listener)
    }
}
