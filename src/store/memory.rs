//! Production-ready, single-process backend.
//!
//! This is the backend the crate ships with: zero external services are
//! required to compile, run, or test against it. Deployments that need
//! durable state shared across processes swap this for a Redis-compatible
//! client behind the same [`StoreBackend`] trait (the `USE_DOCKER`/`"redis"`
//! hostname convention of the relayer config is the seam to wire it up at;
//! the trait, not a hardcoded client, is what the rest of the crate depends
//! on).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::backend::StoreBackend;
use crate::error::Result;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Default)]
pub struct InMemoryBackend {
    kv: Mutex<HashMap<String, String>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl StoreBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.kv.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .kv
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        // No subscriber is not an error: pub-sub is best-effort per §5.
        let _ = self.sender_for(channel).send(payload);
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender_for(channel).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = InMemoryBackend::new();
        backend.set("a", "1".into()).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), Some("1".into()));
    }

    #[tokio::test]
    async fn scan_filters_by_prefix() {
        let backend = InMemoryBackend::new();
        backend.set("relayer:bounty:1", "x".into()).await.unwrap();
        backend.set("relayer:amb:1", "y".into()).await.unwrap();

        let keys = backend.scan("relayer:bounty:").await.unwrap();
        assert_eq!(keys, vec!["relayer:bounty:1".to_string()]);
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let backend = InMemoryBackend::new();
        let mut rx = backend.subscribe("relayer:key");
        backend.publish("relayer:key", "hello".into()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_not_an_error() {
        let backend = InMemoryBackend::new();
        backend.publish("relayer:key", "hello".into()).await.unwrap();
    }
}
