//! Inbound game-server callbacks
//!
//! Host controllers forward their game servers' callbacks to the actions
//! queue as RPC requests. Each is executed and answered on its `reply_to`
//! queue with the request's correlation id.

use crate::amqp::messages::{decode, encode, RpcResponse, CONTENT_TYPE_JSON, DEFAULT_EXCHANGE};
use crate::controller::{ActionRequest, ControllerActions};
use crate::error::{status_of, MatchmakingError, Result};
use amqprs::{
    channel::{
        BasicCancelArguments, BasicConsumeArguments, BasicPublishArguments, Channel,
        QueueDeclareArguments,
    },
    consumer::AsyncConsumer,
    BasicProperties, Deliver,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Executes one parsed callback
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle_action(&self, request: ActionRequest) -> Result<Value>;
}

#[async_trait]
impl ActionHandler for ControllerActions {
    async fn handle_action(&self, request: ActionRequest) -> Result<Value> {
        self.dispatch(request).await
    }
}

/// Decode, execute and turn the outcome into a response
pub async fn respond(handler: &dyn ActionHandler, content: &[u8]) -> RpcResponse {
    let request = match decode::<ActionRequest>(content) {
        Ok(request) => request,
        Err(e) => return RpcResponse::error(status_of(&e), &e.to_string()),
    };

    match handler.handle_action(request).await {
        Ok(body) => RpcResponse::ok(body),
        Err(e) => RpcResponse::error(status_of(&e), &e.to_string()),
    }
}

/// Consumer for the controller actions queue
pub struct ActionRequestConsumer {
    handler: Arc<dyn ActionHandler>,
    channel: Channel,
    consumer_tag: String,
}

impl ActionRequestConsumer {
    pub fn new(handler: Arc<dyn ActionHandler>, channel: Channel) -> Self {
        let consumer_tag = format!("actions-consumer-{}", uuid::Uuid::new_v4());

        Self {
            handler,
            channel,
            consumer_tag,
        }
    }

    /// Declare the queue and start consuming from it
    pub async fn start_consuming(&self, queue_name: &str) -> Result<()> {
        let declare = QueueDeclareArguments::new(queue_name)
            .durable(true)
            .auto_delete(false)
            .finish();
        self.channel.queue_declare(declare).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to declare queue {}: {}", queue_name, e),
            }
        })?;

        let mut args = BasicConsumeArguments::new(queue_name, &self.consumer_tag);
        args.manual_ack(false);

        self.channel
            .basic_consume(
                ActionConsumer {
                    handler: self.handler.clone(),
                },
                args,
            )
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to start consuming: {}", e),
            })?;

        info!("Started consuming controller actions from queue: {}", queue_name);
        Ok(())
    }

    /// Stop consuming messages
    pub async fn stop_consuming(&self) -> Result<()> {
        let args = BasicCancelArguments::new(&self.consumer_tag);

        self.channel.basic_cancel(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to stop consuming: {}", e),
            }
        })?;

        info!("Stopped consuming controller actions");
        Ok(())
    }
}

struct ActionConsumer {
    handler: Arc<dyn ActionHandler>,
}

#[async_trait]
impl AsyncConsumer for ActionConsumer {
    async fn consume(
        &mut self,
        channel: &Channel,
        deliver: Deliver,
        basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        let start_time = Instant::now();

        let response = respond(self.handler.as_ref(), &content).await;
        debug!(
            "Controller action processed - delivery_tag: {}, status: {}, time: {:.2}ms",
            delivery_tag,
            response.status,
            start_time.elapsed().as_secs_f64() * 1000.0
        );

        let Some(reply_to) = basic_properties.reply_to() else {
            if !response.is_success() {
                warn!(
                    "Controller action failed with nobody to tell - delivery_tag: {}, status: {}",
                    delivery_tag, response.status
                );
            }
            return;
        };

        let payload = match encode(&response) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode action response: {}", e);
                return;
            }
        };

        let mut properties = BasicProperties::default();
        properties.with_content_type(CONTENT_TYPE_JSON);
        if let Some(correlation_id) = basic_properties.correlation_id() {
            properties.with_correlation_id(correlation_id);
        }

        if let Err(e) = channel
            .basic_publish(
                properties,
                payload,
                BasicPublishArguments::new(DEFAULT_EXCHANGE, reply_to),
            )
            .await
        {
            error!(
                "Failed to answer controller action - delivery_tag: {}, reply_to: '{}', error: {}",
                delivery_tag, reply_to, e
            );
        }
    }
}
