//! Per-connection handler units
//!
//! Every accepted connection is owned by exactly one isolated unit, either a
//! child process whose stdin/stdout are the socket or an in-process tokio
//! task. The dispatcher starts units and the reaper accounts for them once
//! they terminate.

pub use dispatcher::HandlerDispatcher;
pub use reaper::{LifecycleReaper, UnitFinished};
pub use registry::{UnitRecord, UnitRegistry};
pub use spawner::{HandlerExit, HandlerSpawner, HandlerUnit, ProcessSpawner, TaskSpawner};

mod dispatcher;
mod reaper;
mod registry;
mod spawner;
