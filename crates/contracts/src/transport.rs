//! BrokerTransport trait - connector wire interface
//!
//! A transport owns the raw session with a pub/sub broker. The connector layers
//! backoff, resubscription and topic routing on top of it.

use bytes::Bytes;

use crate::TwinError;

/// Event surfaced by a transport's event stream
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Message delivered on a concrete topic
    Message { topic: String, payload: Bytes },
    /// Session dropped by the broker or the network
    Disconnected { reason: String },
}

/// Broker transport trait
///
/// Implementations must tolerate `connect` being called again after a
/// `Disconnected` event.
#[trait_variant::make(BrokerTransport: Send)]
pub trait LocalBrokerTransport {
    /// Transport name (used for logging/health)
    fn name(&self) -> &str;

    /// Open the session
    async fn connect(&self) -> Result<(), TwinError>;

    /// Register a pattern with the broker
    async fn subscribe(&self, pattern: &str, qos: u8) -> Result<(), TwinError>;

    /// Send a payload on a concrete topic
    async fn publish(&self, topic: &str, payload: Bytes, qos: u8) -> Result<(), TwinError>;

    /// Close the session
    async fn disconnect(&self) -> Result<(), TwinError>;

    /// Stream of inbound messages and disconnect notifications
    fn events(&self) -> async_channel::Receiver<TransportEvent>;
}
