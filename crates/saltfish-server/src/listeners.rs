//! Listener dispatch.
//!
//! Mutating RPCs publish `(request kind, serialized request)` pairs; every
//! registered listener whose kind matches (or is `ALL`) receives them on its
//! own queue. One task per listener drains that queue, so a listener sees
//! publications serialized in publish order, a slow listener never blocks
//! the publisher, and listeners never block each other.
//!
//! The registry is populated during server construction and frozen once the
//! bus is shared: [`ListenerBus::register`] needs `&mut self`, which is
//! unreachable behind the `Arc` handed to the service.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use saltfish_proto::saltfish::RequestType;
use saltfish_summarizer::SummarizerMap;

/// One published request.
#[derive(Debug, Clone)]
pub struct Publication {
    pub kind: RequestType,
    pub payload: Bytes,
}

impl Publication {
    /// The wire byte identifying the kind on the pub/sub channel.
    pub fn kind_byte(&self) -> u8 {
        self.kind as i32 as u8
    }
}

/// A subscriber. Handlers run on their listener's dedicated task and may
/// hold mutable state without further synchronization.
#[async_trait]
pub trait Listener: Send + 'static {
    async fn handle(&mut self, publication: Publication);
}

pub struct ListenerBus {
    listeners: Vec<(RequestType, mpsc::UnboundedSender<Publication>)>,
}

impl Default for ListenerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Subscribes `listener` to requests of `kind` (`RequestType::All`
    /// receives everything) and spawns its queue-draining task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<L: Listener>(&mut self, kind: RequestType, mut listener: L) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Publication>();
        tokio::spawn(async move {
            while let Some(publication) = rx.recv().await {
                listener.handle(publication).await;
            }
        });
        self.listeners.push((kind, tx));
    }

    /// Hands `payload` to every listener subscribed to `kind`. Never
    /// blocks; dispatch happens on the listeners' own tasks.
    pub fn publish(&self, kind: RequestType, payload: Bytes) {
        for (registered, tx) in &self.listeners {
            if *registered == kind || *registered == RequestType::All {
                // A send only fails when the listener task is gone, which
                // happens at shutdown.
                let _ = tx.send(Publication {
                    kind,
                    payload: payload.clone(),
                });
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Bridges the bus onto the external pub/sub transport: publications are
/// re-framed as `(request_kind_byte, serialized_request_bytes)` pairs on a
/// channel drained by the transport driver.
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<(u8, Bytes)>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(u8, Bytes)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Listener for ChannelPublisher {
    async fn handle(&mut self, publication: Publication) {
        let frame = (publication.kind_byte(), publication.payload);
        let _ = self.tx.send(frame);
    }
}

/// Feeds successful PutRecords publications into the summarizer.
pub struct SummarizerListener {
    map: SummarizerMap,
}

impl SummarizerListener {
    pub fn new(map: SummarizerMap) -> Self {
        Self { map }
    }
}

#[async_trait]
impl Listener for SummarizerListener {
    async fn handle(&mut self, publication: Publication) {
        self.map.push_request(&publication.payload).await;
    }
}
