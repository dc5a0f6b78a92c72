//! Saltfish gRPC Server
//!
//! Wires the dataset service together: the five RPC state machines over the
//! metadata store and the KV object store, the listener bus with the
//! summarizer and the pub/sub bridge, and the configuration surface.

pub mod config;
pub mod listeners;
pub mod service;

pub use config::{Cli, ConfigError, ServerConfig};
pub use listeners::{ChannelPublisher, Listener, ListenerBus, Publication, SummarizerListener};
pub use service::{DatasetStoreService, ServiceConfig};
