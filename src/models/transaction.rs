use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::intent::Currency;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cbe,
    Mpesa,
    Telebirr,
    Awash,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cbe,
        PaymentMethod::Mpesa,
        PaymentMethod::Telebirr,
        PaymentMethod::Awash,
    ];

    /// Account-number prefix: `2517` for mpesa, `2519` for everything else.
    pub fn account_prefix(self) -> &'static str {
        match self {
            PaymentMethod::Mpesa => "2517",
            _ => "2519",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// Row in `payment_transactions`. A `UNIQUE` constraint on `payment_intent_id`
/// closes the idempotency window the original schema left open (§5, §9).
#[derive(Debug, Clone, FromRow)]
pub struct PaymentTransaction {
    pub id: Uuid,
    pub payment_intent_id: Uuid,
    pub merchant_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    pub payment_method: PaymentMethod,
    pub fee_amount: Decimal,
    pub account_number: String,
    pub third_party_reference: Option<String>,
    pub status: TransactionStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Row in `merchant_balances`, keyed on `(merchant_id, currency)`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MerchantBalance {
    pub merchant_id: Uuid,
    pub currency: Currency,
    pub available_balance: Decimal,
    pub total_deposit: Decimal,
    pub total_transaction_count: i64,
    pub last_updated: DateTime<Utc>,
}

/// Payload POSTed to the merchant's `callback_url` (§6).
#[derive(Debug, Clone, Serialize)]
pub struct CallbackPayload {
    pub payment_intent_id: String,
    pub merchant_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Currency,
    pub status: &'static str,
    pub account_number: String,
    pub payment_method: PaymentMethod,
    pub third_party_reference: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub fee_amount: Decimal,
    pub processed_at: DateTime<Utc>,
    pub nonce: String,
    pub metadata: Option<serde_json::Value>,
}
