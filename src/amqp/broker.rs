//! Party fan-out over AMQP
//!
//! Every party gets an auto-deleted topic exchange. Each subscriber owns an
//! exclusive queue bound with its member key and the broadcast key; the
//! queue's message TTL drops whatever a slow listener has not picked up.

use crate::amqp::messages::CONTENT_TYPE_JSON;
use crate::error::{MatchmakingError, Result};
use crate::party::messages::{
    broadcast_routing_key, exchange_name, member_routing_key, PartyMessage, Recipient,
};
use crate::party::{PartyBroker, Subscription};
use crate::types::PartyId;
use crate::utils::IdSequence;
use amqprs::channel::{
    BasicCancelArguments, BasicConsumeArguments, BasicPublishArguments, Channel,
    ExchangeDeclareArguments, QueueBindArguments, QueueDeclareArguments, QueueDeleteArguments,
};
use amqprs::consumer::AsyncConsumer;
use amqprs::{BasicProperties, Deliver, FieldName, FieldTable, FieldValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

fn amqp_error(what: &str, e: impl std::fmt::Display) -> MatchmakingError {
    MatchmakingError::AmqpConnectionFailed {
        message: format!("Failed to {}: {}", what, e),
    }
}

/// Broker-side state of one subscription
struct Listener {
    consumer_tag: String,
    queue: String,
}

pub struct AmqpPartyBroker {
    channel: Channel,
    message_ttl_ms: u64,
    listeners: Mutex<HashMap<u64, Listener>>,
    ids: IdSequence,
}

impl AmqpPartyBroker {
    pub fn new(channel: Channel, message_ttl_ms: u64) -> Self {
        Self {
            channel,
            message_ttl_ms,
            listeners: Mutex::new(HashMap::new()),
            ids: IdSequence::new(),
        }
    }

    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        let args = ExchangeDeclareArguments::new(exchange, "topic")
            .auto_delete(true)
            .finish();
        self.channel
            .exchange_declare(args)
            .await
            .map_err(|e| amqp_error("declare party exchange", e))?;
        Ok(())
    }

    fn queue_arguments(&self) -> Result<FieldTable> {
        let ttl = i32::try_from(self.message_ttl_ms).unwrap_or(i32::MAX);
        let name = FieldName::try_from("x-message-ttl")
            .map_err(|e| amqp_error("build queue arguments", e))?;
        let mut table = FieldTable::new();
        table.insert(name, FieldValue::I(ttl));
        Ok(table)
    }
}

#[async_trait]
impl PartyBroker for AmqpPartyBroker {
    async fn subscribe(
        &self,
        gamespace: &str,
        party_id: PartyId,
        account_id: &str,
    ) -> Result<Subscription> {
        let exchange = exchange_name(gamespace, party_id);
        self.declare_exchange(&exchange).await?;

        let args = QueueDeclareArguments::new("")
            .exclusive(true)
            .auto_delete(true)
            .arguments(self.queue_arguments()?)
            .finish();
        let (queue, _, _) = self
            .channel
            .queue_declare(args)
            .await
            .map_err(|e| amqp_error("declare party queue", e))?
            .ok_or_else(|| amqp_error("declare party queue", "no queue name returned"))?;

        for routing_key in [
            member_routing_key(gamespace, account_id),
            broadcast_routing_key(gamespace),
        ] {
            self.channel
                .queue_bind(QueueBindArguments::new(&queue, &exchange, &routing_key))
                .await
                .map_err(|e| amqp_error("bind party queue", e))?;
        }

        let id = self.ids.next();
        let consumer_tag = format!("party-{}-{}", party_id, id);
        let mut consume = BasicConsumeArguments::new(&queue, &consumer_tag);
        consume.manual_ack(false);

        let (sender, receiver) = mpsc::unbounded_channel();
        self.channel
            .basic_consume(PartyConsumer { sender }, consume)
            .await
            .map_err(|e| amqp_error("consume party queue", e))?;

        self.listeners
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire party listeners lock".to_string(),
            })?
            .insert(
                id,
                Listener {
                    consumer_tag,
                    queue: queue.clone(),
                },
            );

        debug!(
            "Party subscription opened - party_id: {}, account_id: '{}', queue: '{}'",
            party_id, account_id, queue
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
        let exchange = exchange_name(gamespace, party_id);
        // Publishing to an undeclared exchange closes the channel
        self.declare_exchange(&exchange).await?;

        let mut properties = BasicProperties::default();
        properties.with_content_type(CONTENT_TYPE_JSON);

        self.channel
            .basic_publish(
                properties,
                message.to_bytes()?,
                BasicPublishArguments::new(&exchange, &recipient.routing_key(gamespace)),
            )
            .await
            .map_err(|e| amqp_error("publish party message", e))?;
        Ok(())
    }

    async fn unsubscribe(&self, subscription_id: u64) -> Result<()> {
        let listener = self
            .listeners
            .lock()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire party listeners lock".to_string(),
            })?
            .remove(&subscription_id);
        let Some(listener) = listener else {
            return Ok(());
        };

        self.channel
            .basic_cancel(BasicCancelArguments::new(&listener.consumer_tag))
            .await
            .map_err(|e| amqp_error("cancel party consumer", e))?;
        self.channel
            .queue_delete(QueueDeleteArguments::new(&listener.queue))
            .await
            .map_err(|e| amqp_error("delete party queue", e))?;
        Ok(())
    }
}

/// Forwards deliveries of one subscriber queue into its `Subscription`
struct PartyConsumer {
    sender: mpsc::UnboundedSender<PartyMessage>,
}

#[async_trait]
impl AsyncConsumer for PartyConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        match PartyMessage::from_bytes(&content) {
            Ok(message) => {
                // The session may already be gone
                let _ = self.sender.send(message);
            }
            Err(e) => warn!(
                "Dropping malformed party message - routing_key: '{}', error: {}",
                deliver.routing_key(),
                e
            ),
        }
    }
}
