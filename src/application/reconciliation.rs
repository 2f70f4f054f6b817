use crate::application::settlement::{OrderRequest, SettlementEngine, SettlementResult};
use crate::config::RetryPolicy;
use crate::domain::gateway::{Classification, GatewayError, StatusReport};
use crate::domain::order::{Gateway, Order, OrderId, OrderRef, OrderStatus};
use crate::domain::ports::{OrderStore, PaymentGateway};
use crate::error::{Result, SettlementError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Settled(SettlementResult),
    /// The provider has no decision yet; the order stays `Pending`.
    StillPending,
    OrderNotFound,
}

/// Polls a gateway for orders that get no push notification and hands
/// terminal answers to the settlement engine.
///
/// Holds no state about which orders it has seen: running it twice for the
/// same order is safe because `settle` is.
pub struct ReconciliationScheduler {
    engine: Arc<SettlementEngine>,
    gateway: Arc<dyn PaymentGateway>,
    policy: RetryPolicy,
}

impl ReconciliationScheduler {
    pub fn new(
        engine: Arc<SettlementEngine>,
        gateway: Arc<dyn PaymentGateway>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            engine,
            gateway,
            policy,
        }
    }

    pub fn engine(&self) -> &Arc<SettlementEngine> {
        &self.engine
    }

    /// Creates an order and, for polled gateways, schedules its first check.
    pub async fn open_order(
        self: &Arc<Self>,
        request: OrderRequest,
    ) -> Result<(Order, Option<JoinHandle<Result<ReconcileOutcome>>>)> {
        let order = self.engine.create_order(request).await?;
        if order.gateway != Gateway::Poll {
            return Ok((order, None));
        }
        self.engine.acknowledge(OrderRef::Id(order.id)).await?;
        let handle = self.schedule(OrderRef::Id(order.id));
        Ok((order, Some(handle)))
    }

    /// Runs [`reconcile`](Self::reconcile) after the initial delay.
    pub fn schedule(self: &Arc<Self>, order_ref: OrderRef) -> JoinHandle<Result<ReconcileOutcome>> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(scheduler.policy.initial_delay()).await;
            scheduler.reconcile(order_ref).await
        })
    }

    /// Queries the gateway, retrying with backoff while it is unavailable.
    ///
    /// Exhausting the retries returns `AdapterUnavailable` and leaves the
    /// order untouched; unavailability is never a payment decision.
    pub async fn reconcile(&self, order_ref: OrderRef) -> Result<ReconcileOutcome> {
        self.reconcile_with(order_ref, self.policy.max_retries).await
    }

    /// One query, no retries. Used when the customer is redirected back
    /// from the provider.
    pub async fn check_now(&self, order_ref: OrderRef) -> Result<ReconcileOutcome> {
        self.reconcile_with(order_ref, 0).await
    }

    /// Reconciles every unsettled order of a polled gateway once.
    pub async fn sweep(&self) -> Result<Vec<(OrderId, Result<ReconcileOutcome>)>> {
        let store = self.engine.store();
        let mut orders = store.orders_with_status(OrderStatus::Created).await?;
        orders.extend(store.orders_with_status(OrderStatus::Pending).await?);

        let mut results = Vec::new();
        for order in orders.into_iter().filter(|o| o.gateway == Gateway::Poll) {
            let outcome = self.reconcile(OrderRef::Id(order.id)).await;
            if let Err(e) = &outcome {
                warn!(order = order.id, error = %e, "Sweep could not reconcile order");
            }
            results.push((order.id, outcome));
        }
        info!(checked = results.len(), "Sweep finished");
        Ok(results)
    }

    #[instrument(skip(self), fields(order = %order_ref))]
    async fn reconcile_with(&self, order_ref: OrderRef, max_retries: u32) -> Result<ReconcileOutcome> {
        let Some(order) = self.engine.store().get_order(order_ref).await? else {
            warn!("Reconciliation for unknown order");
            return Ok(ReconcileOutcome::OrderNotFound);
        };
        if order.status().is_terminal() {
            return Ok(ReconcileOutcome::Settled(SettlementResult::AlreadySettled(
                order.status(),
            )));
        }
        if order.status() == OrderStatus::Created {
            self.engine.acknowledge(order_ref).await?;
        }

        let mut retries = 0;
        loop {
            match self.query(&order).await {
                Ok(report) => {
                    return match report.classify() {
                        Classification::Terminal(outcome) => {
                            info!(code = report.code, outcome = ?outcome, "Gateway reported a decision");
                            let result = self.engine.settle(order_ref, outcome).await?;
                            Ok(ReconcileOutcome::Settled(result))
                        }
                        Classification::Unresolved => {
                            info!(code = report.code, "Payment still pending at gateway");
                            Ok(ReconcileOutcome::StillPending)
                        }
                    };
                }
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;
                    let delay = self.policy.backoff(retries);
                    warn!(error = %e, retry = retries, ?delay, "Gateway unavailable, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let attempts = retries + 1;
                    error!(error = %e, attempts, "Gateway unavailable, giving up; order left unsettled");
                    return Err(SettlementError::AdapterUnavailable {
                        attempts,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    async fn query(&self, order: &Order) -> std::result::Result<StatusReport, GatewayError> {
        let timeout = self.policy.attempt_timeout();
        match tokio::time::timeout(timeout, self.gateway.query_status(order)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        }
    }
}
