use crate::application::reconciliation::{ReconcileOutcome, ReconciliationScheduler};
use crate::application::settlement::{AcknowledgeResult, SettlementEngine, SettlementResult};
use crate::domain::gateway::{WebhookEvent, WebhookKind};
use crate::domain::order::{Gateway, OrderRef, OrderStatus};
use crate::domain::ports::OrderStore;
use crate::error::{Result, SettlementError};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookReply {
    Acknowledged(AcknowledgeResult),
    Settled(SettlementResult),
    Status(OrderStatus),
    OrderNotFound,
}

/// Entry point for provider callbacks.
///
/// Push events go straight to the engine; redirect callbacks from polled
/// providers trigger one immediate status check.
pub struct WebhookHandler {
    engine: Arc<SettlementEngine>,
    scheduler: Option<Arc<ReconciliationScheduler>>,
}

impl WebhookHandler {
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        Self {
            engine,
            scheduler: None,
        }
    }

    pub fn with_scheduler(scheduler: Arc<ReconciliationScheduler>) -> Self {
        Self {
            engine: scheduler.engine().clone(),
            scheduler: Some(scheduler),
        }
    }

    #[instrument(skip(self), fields(order = %event.order_ref, code = event.raw_code))]
    pub async fn handle(&self, event: WebhookEvent) -> Result<WebhookReply> {
        info!(kind = ?event.kind, "Webhook received");
        match event.kind {
            WebhookKind::Started => match self.engine.acknowledge(event.order_ref).await? {
                AcknowledgeResult::OrderNotFound => Ok(WebhookReply::OrderNotFound),
                result => Ok(WebhookReply::Acknowledged(result)),
            },
            WebhookKind::Resolved(outcome) => {
                match self.engine.settle(event.order_ref, outcome).await? {
                    SettlementResult::OrderNotFound => Ok(WebhookReply::OrderNotFound),
                    result => Ok(WebhookReply::Settled(result)),
                }
            }
            WebhookKind::Check => match self.engine.store().get_order(event.order_ref).await? {
                Some(order) => Ok(WebhookReply::Status(order.status())),
                None => Ok(WebhookReply::OrderNotFound),
            },
        }
    }

    pub async fn handle_redirect(&self, transaction_id: Uuid) -> Result<ReconcileOutcome> {
        let scheduler = self.scheduler.as_ref().ok_or_else(|| {
            SettlementError::ValidationError(
                "Redirect callbacks need a polled gateway".to_string(),
            )
        })?;
        let order_ref = OrderRef::Transaction(transaction_id);
        let Some(order) = self.engine.store().get_order(order_ref).await? else {
            return Ok(ReconcileOutcome::OrderNotFound);
        };
        if order.gateway != Gateway::Poll {
            return Err(SettlementError::ValidationError(format!(
                "Order {} is not paid through a polled gateway",
                order.id
            )));
        }
        scheduler.check_now(order_ref).await
    }
}
