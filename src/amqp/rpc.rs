//! Host controller client over AMQP request/response
//!
//! Requests go to the controllers' direct exchange keyed by host address,
//! with `reply_to` naming this process's exclusive reply queue. Replies are
//! matched back to the waiting caller by correlation id.

use crate::amqp::messages::{
    decode, encode, RpcRequest, RpcResponse, CONTENT_TYPE_JSON, METHOD_HEARTBEAT, METHOD_SPAWN,
    METHOD_TERMINATE,
};
use crate::controller::{HeartbeatReport, HostController, SpawnRequest, SpawnResult};
use crate::error::{MatchmakingError, Result};
use crate::types::{Host, RoomId};
use crate::utils::generate_correlation_id;
use amqprs::channel::{
    BasicConsumeArguments, BasicPublishArguments, Channel, ExchangeDeclareArguments,
    QueueDeclareArguments,
};
use amqprs::consumer::AsyncConsumer;
use amqprs::{BasicProperties, Deliver};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type PendingReplies = Arc<Mutex<HashMap<String, oneshot::Sender<RpcResponse>>>>;

fn amqp_error(what: &str, e: impl std::fmt::Display) -> MatchmakingError {
    MatchmakingError::AmqpConnectionFailed {
        message: format!("Failed to {}: {}", what, e),
    }
}

fn pending_lock_error() -> MatchmakingError {
    MatchmakingError::InternalError {
        message: "Failed to acquire pending replies lock".to_string(),
    }
}

pub struct AmqpHostController {
    channel: Channel,
    exchange: String,
    reply_queue: String,
    pending: PendingReplies,
    timeout: Duration,
}

impl AmqpHostController {
    /// Declare the controllers' exchange and start listening for replies
    pub async fn connect(channel: Channel, exchange: &str, timeout: Duration) -> Result<Self> {
        let args = ExchangeDeclareArguments::new(exchange, "direct")
            .durable(true)
            .finish();
        channel
            .exchange_declare(args)
            .await
            .map_err(|e| amqp_error("declare controller exchange", e))?;

        let args = QueueDeclareArguments::new("")
            .exclusive(true)
            .auto_delete(true)
            .finish();
        let (reply_queue, _, _) = channel
            .queue_declare(args)
            .await
            .map_err(|e| amqp_error("declare reply queue", e))?
            .ok_or_else(|| amqp_error("declare reply queue", "no queue name returned"))?;

        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let mut consume = BasicConsumeArguments::new(&reply_queue, "controller-replies");
        consume.manual_ack(false);
        channel
            .basic_consume(
                ReplyConsumer {
                    pending: pending.clone(),
                },
                consume,
            )
            .await
            .map_err(|e| amqp_error("consume reply queue", e))?;

        debug!(
            "Host controller client ready - exchange: '{}', reply_queue: '{}'",
            exchange, reply_queue
        );
        Ok(Self {
            channel,
            exchange: exchange.to_string(),
            reply_queue,
            pending,
            timeout,
        })
    }

    /// Send a request to a host and wait for its 2xx body
    pub async fn call(&self, host: &Host, method: &str, params: Value) -> Result<Value> {
        let correlation_id = generate_correlation_id();
        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| pending_lock_error())?
            .insert(correlation_id.clone(), sender);

        let mut properties = BasicProperties::default();
        properties
            .with_correlation_id(&correlation_id)
            .with_reply_to(&self.reply_queue)
            .with_content_type(CONTENT_TYPE_JSON);

        let published = self
            .channel
            .basic_publish(
                properties,
                encode(&RpcRequest::new(method, params))?,
                BasicPublishArguments::new(&self.exchange, &host.address),
            )
            .await;
        if let Err(e) = published {
            self.forget(&correlation_id);
            return Err(amqp_error("publish controller request", e).into());
        }

        let response = match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(MatchmakingError::InternalError {
                    message: format!("Reply channel closed for {}", method),
                }
                .into())
            }
            Err(_) => {
                self.forget(&correlation_id);
                warn!(
                    "Host controller timed out - host_id: {}, method: {}",
                    host.id, method
                );
                return Err(MatchmakingError::ControllerTimeout {
                    action: method.to_string(),
                }
                .into());
            }
        };

        response.into_body()
    }

    fn forget(&self, correlation_id: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(correlation_id);
        }
    }
}

fn from_body<T: serde::de::DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| {
        MatchmakingError::SpawnFailed {
            code: 500,
            message: format!("Malformed controller response: {}", e),
        }
        .into()
    })
}

#[async_trait]
impl HostController for AmqpHostController {
    async fn spawn(&self, host: &Host, request: SpawnRequest) -> Result<SpawnResult> {
        let params = serde_json::to_value(&request)?;
        from_body(self.call(host, METHOD_SPAWN, params).await?)
    }

    async fn terminate(&self, host: &Host, gamespace: &str, room_id: RoomId) -> Result<()> {
        self.call(
            host,
            METHOD_TERMINATE,
            json!({ "gamespace": gamespace, "room_id": room_id }),
        )
        .await?;
        Ok(())
    }

    async fn heartbeat(&self, host: &Host) -> Result<HeartbeatReport> {
        from_body(self.call(host, METHOD_HEARTBEAT, json!({})).await?)
    }
}

/// Completes pending calls from the reply queue
struct ReplyConsumer {
    pending: PendingReplies,
}

impl ReplyConsumer {
    fn complete(&self, correlation_id: &str, content: &[u8]) {
        let waiter = self
            .pending
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(correlation_id));
        let Some(waiter) = waiter else {
            debug!("Dropping late controller reply - correlation_id: '{}'", correlation_id);
            return;
        };

        let response = decode::<RpcResponse>(content)
            .unwrap_or_else(|e| RpcResponse::error(500, &e.to_string()));
        let _ = waiter.send(response);
    }
}

#[async_trait]
impl AsyncConsumer for ReplyConsumer {
    async fn consume(
        &mut self,
        _channel: &Channel,
        _deliver: Deliver,
        basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        match basic_properties.correlation_id() {
            Some(correlation_id) => self.complete(correlation_id, &content),
            None => warn!("Controller reply without correlation id"),
        }
    }
}
