//! Network Module Implementation
//!
//! Connection lifecycle and protocol framing shared by the client and the
//! server, built on tokio's async I/O primitives.
//!
//! # Components
//!
//! - `AddressResolver`: host/port to ordered endpoint candidates
//! - `ConnectionEstablisher`: client side fallback across candidates
//! - `Listener`: server side bind with `SO_REUSEADDR` and a fixed backlog
//! - `ConnectionAcceptor`: accept loop feeding the handler dispatcher
//! - `Posting`/`encode`: the line based wire format

pub use acceptor::{Accept, ConnectionAcceptor};
pub use codec::{encode, Posting, SENTINEL};
pub use connector::{Connect, ConnectionEstablisher, TcpConnector};
pub use listener::Listener;
pub use resolver::{
    AddressResolver, Candidate, CandidateIter, Family, Intent, StaticResolver, SystemResolver,
};

mod acceptor;
mod codec;
mod connector;
mod listener;
mod resolver;
