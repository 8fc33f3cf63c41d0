use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::BotError;

use super::{BusMessage, EventBus, EventMetadata};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-invocation context threaded into every handler: the inbound topic,
/// the typed metadata carrier and a cancellation token from the router.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub topic: String,
    pub metadata: EventMetadata,
    pub cancel: CancellationToken,
}

/// A message a handler wants published. The topic may be left blank for
/// handlers whose outbound topic is statically mapped.
#[derive(Debug, Clone)]
pub struct Routed {
    pub topic: Option<String>,
    pub payload: serde_json::Value,
    pub metadata: EventMetadata,
}

impl Routed {
    /// A message bound for an explicitly named topic.
    pub fn to(
        topic: impl Into<String>,
        payload: &impl Serialize,
        metadata: EventMetadata,
    ) -> Result<Self, BotError> {
        Ok(Self {
            topic: Some(topic.into()),
            payload: serde_json::to_value(payload)?,
            metadata,
        })
    }

    /// A message whose topic the router resolves from its static map.
    pub fn unrouted(payload: &impl Serialize, metadata: EventMetadata) -> Result<Self, BotError> {
        Ok(Self {
            topic: None,
            payload: serde_json::to_value(payload)?,
            metadata,
        })
    }
}

/// How a handler's produced messages find their topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundRoute {
    /// Handler produces nothing routable on its own.
    None,
    /// Every produced message goes to this topic.
    Static(&'static str),
    /// Each produced message names its own topic.
    Dynamic,
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Vec<Routed>, BotError>> + Send>>;
type Handler = Arc<dyn Fn(EventContext, BusMessage) -> HandlerFuture + Send + Sync>;

struct Route {
    handler_name: &'static str,
    outbound: OutboundRoute,
    handler: Handler,
}

/// Wires handler functions to topics and runs the middleware stack around
/// each delivery: correlation-id injection, metadata stamping, bounded
/// retry with backoff, panic recovery and tracing.
pub struct Router {
    environment: String,
    bus: Arc<dyn EventBus>,
    metrics: Arc<Metrics>,
    routes: HashMap<String, Route>,
    max_attempts: u32,
    backoff: Duration,
}

impl Router {
    pub fn new(environment: impl Into<String>, bus: Arc<dyn EventBus>, metrics: Arc<Metrics>) -> Self {
        Self {
            environment: environment.into(),
            bus,
            metrics,
            routes: HashMap::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Overrides the retry policy; tests shrink the backoff to keep runs fast.
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Name of the consumer group: one instance per environment processes
    /// each message.
    pub fn queue_group(&self) -> String {
        format!("frolfbot-handlers-{}", self.environment)
    }

    pub fn subscribed_topics(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    pub fn subscribe<F, Fut>(
        &mut self,
        topic: impl Into<String>,
        handler_name: &'static str,
        outbound: OutboundRoute,
        handler: F,
    ) where
        F: Fn(EventContext, BusMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Routed>, BotError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |ctx, msg| Box::pin(handler(ctx, msg)));
        self.routes.insert(
            topic.into(),
            Route {
                handler_name,
                outbound,
                handler,
            },
        );
    }

    /// Delivers one inbound message through the middleware stack. An `Err`
    /// means every attempt failed and the caller should NACK for redelivery.
    pub async fn dispatch(&self, message: BusMessage, cancel: CancellationToken) -> Result<(), BotError> {
        let route = self
            .routes
            .get(&message.topic)
            .ok_or_else(|| anyhow!("no handler subscribed to topic {}", message.topic))?;

        let mut message = message;
        if message.metadata.correlation_id.is_empty() {
            message.metadata.correlation_id = Uuid::new_v4().to_string();
        }
        message.metadata.topic = Some(message.topic.clone());

        let mut last_error = anyhow!("handler never ran");
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(anyhow!(
                    "dispatch of {} cancelled before attempt {}",
                    message.topic,
                    attempt
                ));
            }

            let span = info_span!(
                "handle",
                topic = %message.topic,
                handler = route.handler_name,
                correlation_id = %message.metadata.correlation_id,
                attempt
            );
            let ctx = EventContext {
                topic: message.topic.clone(),
                metadata: message.metadata.clone(),
                cancel: cancel.clone(),
            };
            let outcome = AssertUnwindSafe((route.handler)(ctx, message.clone()).instrument(span))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(outputs)) => {
                    self.publish_outputs(route, &message.metadata, outputs).await?;
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!(
                        topic = %message.topic,
                        handler = route.handler_name,
                        attempt,
                        error = %e,
                        "handler attempt failed"
                    );
                    last_error = e;
                }
                Err(_panic) => {
                    error!(
                        topic = %message.topic,
                        handler = route.handler_name,
                        attempt,
                        "handler attempt panicked"
                    );
                    last_error = anyhow!("handler {} panicked", route.handler_name);
                }
            }

            if attempt < self.max_attempts {
                self.metrics.record_handler_retry();
                let delay = self.backoff * attempt;
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        return Err(anyhow!("dispatch of {} cancelled during backoff", message.topic));
                    }
                }
            }
        }

        Err(anyhow!(
            "handler {} exhausted {} attempts: {}",
            route.handler_name,
            self.max_attempts,
            last_error
        ))
    }

    async fn publish_outputs(
        &self,
        route: &Route,
        inbound: &EventMetadata,
        outputs: Vec<Routed>,
    ) -> Result<(), BotError> {
        for routed in outputs {
            let resolved = match route.outbound {
                OutboundRoute::Static(topic) => routed.topic.clone().or(Some(topic.to_string())),
                OutboundRoute::Dynamic => routed.topic.clone(),
                OutboundRoute::None => routed.topic.clone(),
            };
            let Some(topic) = resolved.filter(|t| !t.is_empty()) else {
                // Never guess a destination; mis-delivery during a topic
                // migration is worse than a drop.
                error!(
                    handler = route.handler_name,
                    correlation_id = %inbound.correlation_id,
                    "MESSAGE DROPPED: no outbound topic resolved"
                );
                self.metrics.record_message_dropped();
                continue;
            };

            let mut metadata = routed.metadata;
            if metadata.correlation_id.is_empty() {
                metadata.correlation_id = inbound.correlation_id.clone();
            }
            metadata.topic = Some(topic.clone());
            self.bus
                .publish(BusMessage {
                    topic,
                    payload: routed.payload,
                    metadata,
                })
                .await?;
        }
        Ok(())
    }
}
