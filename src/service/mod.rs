pub use app_error::{AppError, AppResult, EXIT_CONNECT_FAILED, EXIT_FAILURE, EXIT_SEND_FAILED};
pub use client::{Client, Session};
pub use config::{HandlerConfig, LogConfig, NetworkConfig, ServerConfig, DEFAULT_BACKLOG};
pub use server::{serve, Server};
pub use shutdown::Shutdown;
pub use tracing_config::{setup_local_tracing, setup_tracing, verbosity_level};

mod app_error;
mod client;
mod config;
mod server;
mod shutdown;
mod tracing_config;
