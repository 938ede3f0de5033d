//! The raw key/value + pub-sub contract the [`super::Store`] facade is built
//! on. One trait, one production implementation, one in-memory fake —
//! the same shape as [`crate::traits::ChainProvider`].

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;

/// A shared key/value database with channel-based pub-sub, as used for
/// cross-worker durable state and the Submitter request bus.
///
/// Implementations are expected to be cheap to clone (an `Arc` handle to
/// shared storage) since every worker on a chain holds its own handle.
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Returns every key currently stored under `prefix`.
    async fn scan(&self, prefix: &str) -> Result<Vec<String>>;
    async fn publish(&self, channel: &str, payload: String) -> Result<()>;
    /// Subscribes to a channel. The dedicated-subscriber-connection
    /// requirement of a real backing store (e.g. Redis forbidding general
    /// commands on a subscriber connection) is modeled here simply by this
    /// being a distinct, non-command-issuing handle.
    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String>;
}
