//! JSON-RPC payloads of a push-style (merchant API) payment provider.
//!
//! The provider calls one endpoint with a `method` name and `params`; only
//! the fields needed to address the order and classify the call are read.

use crate::application::webhook::WebhookReply;
use crate::domain::gateway::{WebhookEvent, WebhookKind};
use crate::domain::order::{OrderId, OrderRef, OrderStatus, Outcome};
use crate::error::{Result, SettlementError};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

/// Order not found, as the provider expects it.
pub const ERR_ORDER_NOT_FOUND: i64 = -31050;

#[derive(Debug, Deserialize, PartialEq)]
pub struct MerchantRequest {
    pub method: String,
    #[serde(default)]
    pub params: MerchantParams,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct MerchantParams {
    #[serde(default)]
    pub account: Option<MerchantAccount>,
    #[serde(default)]
    pub reason: Option<i64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct MerchantAccount {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub transaction_id: Option<Uuid>,
}

impl TryFrom<&MerchantRequest> for WebhookEvent {
    type Error = SettlementError;

    fn try_from(request: &MerchantRequest) -> Result<Self> {
        let account = request.params.account.as_ref();
        let order_ref = match (
            account.and_then(|a| a.order_id),
            account.and_then(|a| a.transaction_id),
        ) {
            (Some(id), _) => OrderRef::Id(id),
            (None, Some(tx)) => OrderRef::Transaction(tx),
            (None, None) => {
                return Err(SettlementError::ValidationError(format!(
                    "{} carries no order reference",
                    request.method
                )));
            }
        };

        let (kind, raw_code) = match request.method.as_str() {
            "CreateTransaction" => (WebhookKind::Started, 0),
            "PerformTransaction" => (WebhookKind::Resolved(Outcome::Paid), 0),
            "CancelTransaction" => (
                WebhookKind::Resolved(Outcome::Cancelled),
                -request.params.reason.unwrap_or(1).saturating_abs(),
            ),
            "CheckTransaction" | "CheckPerformTransaction" => (WebhookKind::Check, 0),
            other => {
                return Err(SettlementError::ValidationError(format!(
                    "Unsupported merchant method '{}'",
                    other
                )));
            }
        };

        Ok(WebhookEvent {
            order_ref,
            kind,
            raw_code,
        })
    }
}

/// Parses a raw request body into the request and its normalized event.
pub fn parse_request(body: &[u8]) -> Result<(MerchantRequest, WebhookEvent)> {
    let request: MerchantRequest = serde_json::from_slice(body)?;
    let event = WebhookEvent::try_from(&request)?;
    Ok((request, event))
}

fn provider_state(status: OrderStatus) -> i64 {
    match status {
        OrderStatus::Created | OrderStatus::Pending => 1,
        OrderStatus::Paid => 2,
        OrderStatus::Cancelled => -1,
    }
}

/// Renders the JSON-RPC response body for a handled request.
pub fn render_reply(request_id: Option<&Value>, reply: &WebhookReply) -> Value {
    use crate::application::settlement::{AcknowledgeResult, SettlementResult};

    let status = match reply {
        WebhookReply::OrderNotFound
        | WebhookReply::Acknowledged(AcknowledgeResult::OrderNotFound)
        | WebhookReply::Settled(SettlementResult::OrderNotFound) => {
            return json!({
                "id": request_id,
                "error": { "code": ERR_ORDER_NOT_FOUND, "message": "Order not found" },
            });
        }
        WebhookReply::Acknowledged(AcknowledgeResult::AlreadySettled(status))
        | WebhookReply::Settled(SettlementResult::AlreadySettled(status))
        | WebhookReply::Status(status) => *status,
        WebhookReply::Acknowledged(_) => OrderStatus::Pending,
        WebhookReply::Settled(SettlementResult::Settled(outcome)) => (*outcome).into(),
    };
    json!({
        "id": request_id,
        "result": { "state": provider_state(status) },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::settlement::SettlementResult;

    #[test]
    fn test_parse_perform() {
        let body = br#"{"method":"PerformTransaction","params":{"id":"abc","account":{"order_id":12}},"id":5}"#;
        let (request, event) = parse_request(body).unwrap();

        assert_eq!(request.id, Some(json!(5)));
        assert_eq!(
            event,
            WebhookEvent {
                order_ref: OrderRef::Id(12),
                kind: WebhookKind::Resolved(Outcome::Paid),
                raw_code: 0,
            }
        );
    }

    #[test]
    fn test_parse_cancel_by_transaction_id() {
        let tx = Uuid::new_v4();
        let body = format!(
            r#"{{"method":"CancelTransaction","params":{{"reason":3,"account":{{"transaction_id":"{}"}}}}}}"#,
            tx
        );
        let (_, event) = parse_request(body.as_bytes()).unwrap();

        assert_eq!(event.order_ref, OrderRef::Transaction(tx));
        assert_eq!(event.kind, WebhookKind::Resolved(Outcome::Cancelled));
        assert_eq!(event.raw_code, -3);
    }

    #[test]
    fn test_parse_cancel_with_out_of_range_reason() {
        let body = br#"{"method":"CancelTransaction","params":{"reason":-9223372036854775808,"account":{"order_id":1}}}"#;
        let (_, event) = parse_request(body).unwrap();

        assert_eq!(event.kind, WebhookKind::Resolved(Outcome::Cancelled));
        assert_eq!(event.raw_code, -i64::MAX);
    }

    #[test]
    fn test_parse_rejects_unknown_method_and_missing_order() {
        let unknown = br#"{"method":"GetStatement","params":{"account":{"order_id":1}}}"#;
        assert!(matches!(
            parse_request(unknown),
            Err(SettlementError::ValidationError(_))
        ));

        let anonymous = br#"{"method":"CreateTransaction","params":{}}"#;
        assert!(matches!(
            parse_request(anonymous),
            Err(SettlementError::ValidationError(_))
        ));

        assert!(matches!(
            parse_request(b"not json"),
            Err(SettlementError::Serialization(_))
        ));
    }

    #[test]
    fn test_render_reply() {
        let id = json!(9);
        let paid = render_reply(
            Some(&id),
            &WebhookReply::Settled(SettlementResult::Settled(Outcome::Paid)),
        );
        assert_eq!(paid, json!({"id": 9, "result": {"state": 2}}));

        let again = render_reply(
            Some(&id),
            &WebhookReply::Settled(SettlementResult::AlreadySettled(OrderStatus::Paid)),
        );
        assert_eq!(again, paid);

        let missing = render_reply(None, &WebhookReply::OrderNotFound);
        assert_eq!(missing["error"]["code"], json!(ERR_ORDER_NOT_FOUND));
    }
}
