use crate::domain::ledger::Lang;
use crate::domain::money::Credit;
use crate::domain::order::{OrderId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NotificationPayload {
    pub order: OrderId,
    pub amount: Decimal,
    pub credit_grant: Credit,
    /// The grant spelled out in the user's language, e.g. "1 hours".
    pub credit_grant_text: String,
    pub balance_text: String,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Notification {
    pub user: UserId,
    pub kind: NotificationKind,
    pub payload: NotificationPayload,
}

/// Renders seconds of credit as "H hours M minutes S seconds".
///
/// Zero parts are left out; seconds are always shown when nothing else is.
pub fn format_credit(credit: Credit, lang: Lang) -> String {
    let (hours_word, minutes_word, seconds_word) = match lang {
        Lang::Uz => ("soat", "daqiqa", "soniya"),
        Lang::En => ("hours", "minutes", "seconds"),
        Lang::Ru => ("часов", "минут", "секунд"),
    };

    let total = credit.seconds().trunc().to_u64().unwrap_or(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{} {}", hours, hours_word));
    }
    if minutes > 0 {
        parts.push(format!("{} {}", minutes, minutes_word));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{} {}", seconds, seconds_word));
    }
    parts.join(" ")
}
