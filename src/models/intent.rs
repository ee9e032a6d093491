use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "currency_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Etb,
    Usd,
}

impl Currency {
    /// Parses the wire representation, restricted to the set spec.md names
    /// (ETB/USD) — unlike the original Go validator's stale error-message
    /// copy that also lists EUR/GBP (§4.4).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_uppercase().as_str() {
            "ETB" => Some(Currency::Etb),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

/// Row in `payment_intents`. `id` is the internal primary key; `external_id`
/// (`PI-...`) is what merchants and the broker message see.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentIntent {
    pub id: Uuid,
    pub external_id: String,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub description: Option<String>,
    pub callback_url: String,
    pub nonce: String,
    pub metadata: Option<serde_json::Value>,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIntentRequest {
    pub amount: Decimal,

    pub currency: String,

    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: Option<String>,

    #[validate(url(message = "callback_url must be a valid URL"))]
    pub callback_url: String,

    #[validate(length(
        min = 16,
        max = 64,
        message = "nonce must be between 16 and 64 characters"
    ))]
    pub nonce: String,

    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntentResponse {
    pub status: bool,
    pub payment_intent_id: String,
    pub merchant_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub payment_status: IntentStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub message: String,
}

/// Body published to `payment_intents_exchange` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentCreatedMessage {
    pub payment_intent_id: String,
    pub merchant_id: String,
    pub amount: String,
    pub currency: Currency,
    pub timestamp: DateTime<Utc>,
}

/// What the worker actually needs to decode off the wire — the original
/// source's `PaymentIntentMessage` carries only this one field too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMessage {
    pub payment_intent_id: String,
}
