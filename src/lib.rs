pub mod handler;
pub mod network;
pub mod service;

pub use handler::{HandlerDispatcher, HandlerExit, HandlerSpawner, ProcessSpawner, TaskSpawner};
pub use network::{encode, Posting};
pub use service::{
    serve, setup_local_tracing, setup_tracing, verbosity_level, AppError, AppResult, Client,
    HandlerConfig, LogConfig, NetworkConfig, Server, ServerConfig, Session, Shutdown,
};
