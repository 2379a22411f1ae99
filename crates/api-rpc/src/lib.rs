//! JSON-RPC API Layer
//!
//! Hosts the remote-request dispatch stub and exposes it, together with the
//! local policy triggers, as a JSON-RPC 2.0 server.

pub mod error;
pub mod handler;
pub mod listener;
pub mod server;
pub mod stub;
pub mod types;

pub use listener::{ListenerResolver, MailboxRegistry};
pub use server::{RpcServer, RpcServerConfig};
pub use stub::DistributedHardwareStub;
