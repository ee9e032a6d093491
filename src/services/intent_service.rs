use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto;
use crate::errors::GatewayError;
use crate::models::intent::{Currency, IntentStatus, PaymentIntent};

/// How long a freshly created intent stays valid before it expires (§3).
const INTENT_TTL_MINUTES: i64 = 15;

/// Intent Store (§4.2): persists payment intents, runs the (merchant, nonce)
/// idempotency lookup, and performs compare-and-set status transitions.
#[derive(Clone)]
pub struct IntentStore {
    pool: PgPool,
}

impl IntentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Looks up `(merchant_id, nonce)`; if found, returns it with
    /// `created=false` without re-validating the request body against the
    /// stored row (first write wins). Otherwise inserts a new `pending`
    /// intent with a 15-minute expiry.
    pub async fn get_or_create_intent(
        &self,
        merchant_id: Uuid,
        amount: Decimal,
        currency: Currency,
        description: Option<&str>,
        callback_url: &str,
        nonce: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(PaymentIntent, bool), GatewayError> {
        if let Some(existing) = self.find_by_nonce(merchant_id, nonce).await? {
            return Ok((existing, false));
        }

        let now = Utc::now();
        let expires_at = now + ChronoDuration::minutes(INTENT_TTL_MINUTES);
        let external_id = crypto::generate_payment_intent_id();

        let inserted = sqlx::query_as!(
            PaymentIntent,
            r#"
            INSERT INTO payment_intents (
                id, external_id, merchant_id, amount, currency, description,
                callback_url, nonce, metadata, status, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, external_id, merchant_id, amount,
                      currency as "currency: Currency",
                      description, callback_url, nonce, metadata,
                      status as "status: IntentStatus", created_at, expires_at
            "#,
            Uuid::new_v4(),
            external_id,
            merchant_id,
            amount,
            currency as Currency,
            description,
            callback_url,
            nonce,
            metadata,
            IntentStatus::Pending as IntentStatus,
            now,
            expires_at,
        )
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(intent) => Ok((intent, true)),
            Err(err) if GatewayError::is_unique_violation(&err) => {
                // Lost the race against a concurrent submission with the same
                // nonce; the other writer's row is now authoritative.
                let existing = self
                    .find_by_nonce(merchant_id, nonce)
                    .await?
                    .ok_or(GatewayError::ConflictNotTransitioned)?;
                Ok((existing, false))
            }
            Err(err) => Err(GatewayError::Database(err)),
        }
    }

    async fn find_by_nonce(
        &self,
        merchant_id: Uuid,
        nonce: &str,
    ) -> Result<Option<PaymentIntent>, GatewayError> {
        let row = sqlx::query_as!(
            PaymentIntent,
            r#"
            SELECT id, external_id, merchant_id, amount,
                   currency as "currency: Currency",
                   description, callback_url, nonce, metadata,
                   status as "status: IntentStatus", created_at, expires_at
            FROM payment_intents
            WHERE merchant_id = $1 AND nonce = $2
            "#,
            merchant_id,
            nonce,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_intent(&self, external_id: &str) -> Result<PaymentIntent, GatewayError> {
        sqlx::query_as!(
            PaymentIntent,
            r#"
            SELECT id, external_id, merchant_id, amount,
                   currency as "currency: Currency",
                   description, callback_url, nonce, metadata,
                   status as "status: IntentStatus", created_at, expires_at
            FROM payment_intents WHERE external_id = $1
            "#,
            external_id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GatewayError::NotFound("payment intent not found".into()))
    }

    /// `SET status = to WHERE id = intent_id AND status = from`. Returns
    /// `ConflictNotTransitioned` if zero rows were affected — used to detect
    /// a concurrent transition having already won the race (Guard A / the
    /// worker's claim step).
    pub async fn transition_intent(
        &self,
        intent_id: Uuid,
        from: IntentStatus,
        to: IntentStatus,
    ) -> Result<PaymentIntent, GatewayError> {
        let updated = sqlx::query_as!(
            PaymentIntent,
            r#"
            UPDATE payment_intents
            SET status = $1
            WHERE id = $2 AND status = $3
            RETURNING id, external_id, merchant_id, amount,
                      currency as "currency: Currency",
                      description, callback_url, nonce, metadata,
                      status as "status: IntentStatus", created_at, expires_at
            "#,
            to as IntentStatus,
            intent_id,
            from as IntentStatus,
        )
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(GatewayError::ConflictNotTransitioned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_ttl_matches_spec() {
        assert_eq!(INTENT_TTL_MINUTES, 15);
    }
}
