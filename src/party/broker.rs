//! Party pub/sub
//!
//! Each party owns a topic exchange. A subscriber receives messages routed
//! to its own account plus broadcasts. Delivery is best effort: nothing is
//! queued for a subscriber that is not currently listening.

use crate::error::{MatchmakingError, Result};
use crate::party::messages::{PartyMessage, Recipient};
use crate::types::{AccountId, Gamespace, PartyId};
use crate::utils::IdSequence;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

/// A live subscription to one party's messages
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<PartyMessage>,
}

impl Subscription {
    pub fn new(id: u64, receiver: mpsc::UnboundedReceiver<PartyMessage>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next message, None once the subscription is torn down
    pub async fn recv(&mut self) -> Option<PartyMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PartyMessage> {
        self.receiver.try_recv().ok()
    }
}

#[async_trait]
pub trait PartyBroker: Send + Sync {
    async fn subscribe(
        &self,
        gamespace: &str,
        party_id: PartyId,
        account_id: &str,
    ) -> Result<Subscription>;

    async fn publish(
        &self,
        gamespace: &str,
        party_id: PartyId,
        recipient: &Recipient,
        message: &PartyMessage,
    ) -> Result<()>;

    /// Tear a subscription down; unknown ids are ignored
    async fn unsubscribe(&self, subscription_id: u64) -> Result<()>;
}

struct Subscriber {
    id: u64,
    account_id: AccountId,
    sender: mpsc::UnboundedSender<PartyMessage>,
}

/// In-process broker, also recording every publish
#[derive(Default)]
pub struct InMemoryPartyBroker {
    subscribers: RwLock<HashMap<(Gamespace, PartyId), Vec<Subscriber>>>,
    published: Mutex<Vec<(PartyId, Recipient, PartyMessage)>>,
    ids: IdSequence,
}

fn lock_error() -> MatchmakingError {
    MatchmakingError::InternalError {
        message: "Failed to acquire party broker lock".to_string(),
    }
}

impl InMemoryPartyBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(PartyId, Recipient, PartyMessage)> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn subscriber_count(&self, gamespace: &str, party_id: PartyId) -> usize {
        self.subscribers
            .read()
            .ok()
            .and_then(|s| s.get(&(gamespace.to_string(), party_id)).map(Vec::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl PartyBroker for InMemoryPartyBroker {
    async fn subscribe(
        &self,
        gamespace: &str,
        party_id: PartyId,
        account_id: &str,
    ) -> Result<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.ids.next();

        let mut subscribers = self.subscribers.write().map_err(|_| lock_error())?;
        subscribers
            .entry((gamespace.to_string(), party_id))
            .or_default()
            .push(Subscriber {
                id,
                account_id: account_id.to_string(),
                sender,
            });

        debug!(
            "Party subscription opened - party_id: {}, account_id: '{}', subscription: {}",
            party_id, account_id, id
        );
        Ok(Subscription::new(id, receiver))
    }

    async fn publish(
        &self,
        gamespace: &str,
        party_id: PartyId,
        recipient: &Recipient,
        message: &PartyMessage,
    ) -> Result<()> {
        if let Ok(mut published) = self.published.lock() {
            published.push((party_id, recipient.clone(), message.clone()));
        }

        let subscribers = self.subscribers.read().map_err(|_| lock_error())?;
        let Some(listeners) = subscribers.get(&(gamespace.to_string(), party_id)) else {
            return Ok(());
        };

        for subscriber in listeners {
            let addressed = match recipient {
                Recipient::All => true,
                Recipient::Member(account_id) => *account_id == subscriber.account_id,
            };
            if addressed {
                // A dropped receiver just misses the message
                let _ = subscriber.sender.send(message.clone());
            }
        }
        Ok(())
    }

    async fn unsubscribe(&self, subscription_id: u64) -> Result<()> {
        let mut subscribers = self.subscribers.write().map_err(|_| lock_error())?;
        for listeners in subscribers.values_mut() {
            listeners.retain(|s| s.id != subscription_id);
        }
        subscribers.retain(|_, listeners| !listeners.is_empty());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::party::messages::MessageType;
    use serde_json::json;

    #[tokio::test]
    async fn test_routing_to_member_and_all() {
        let broker = InMemoryPartyBroker::new();
        let mut a = broker.subscribe("gs", 1, "a").await.unwrap();
        let mut b = broker.subscribe("gs", 1, "b").await.unwrap();
        let mut other = broker.subscribe("gs", 2, "a").await.unwrap();

        let hello = PartyMessage::new(MessageType::Custom, json!("hi"));
        broker.publish("gs", 1, &Recipient::All, &hello).await.unwrap();
        broker
            .publish("gs", 1, &Recipient::Member("b".to_string()), &hello)
            .await
            .unwrap();

        assert_eq!(a.try_recv(), Some(hello.clone()));
        assert_eq!(a.try_recv(), None);
        assert_eq!(b.try_recv(), Some(hello.clone()));
        assert_eq!(b.try_recv(), Some(hello));
        assert_eq!(other.try_recv(), None);
        assert_eq!(broker.published().len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_misses_messages() {
        let broker = InMemoryPartyBroker::new();
        let mut a = broker.subscribe("gs", 1, "a").await.unwrap();
        broker.unsubscribe(a.id()).await.unwrap();
        assert_eq!(broker.subscriber_count("gs", 1), 0);

        let message = PartyMessage::new(MessageType::PartyClosed, json!({}));
        broker.publish("gs", 1, &Recipient::All, &message).await.unwrap();
        assert_eq!(a.recv().await, None);
    }
}
