use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::GatewayError;
use crate::models::intent::Currency;
use crate::models::transaction::{MerchantBalance, PaymentMethod, PaymentTransaction, TransactionStatus};

/// Transaction Store (§4.3 in the overview table, detailed design folded
/// into §4.5): persists payment transactions and balance rows, and performs
/// the single-statement atomic balance increment that prevents lost updates
/// under concurrent workers (§5).
#[derive(Clone)]
pub struct TransactionStore {
    pool: PgPool,
}

impl TransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a `pending` transaction for an intent that has just been
    /// claimed (`processing`). The `UNIQUE` constraint on
    /// `payment_intent_id` makes this insert idempotent too (§5 idempotency
    /// layer 4): a concurrent claim that lost the CAS race but still reached
    /// here will get a unique-violation instead of a duplicate row.
    pub async fn insert_pending(
        &self,
        intent_id: Uuid,
        merchant_id: Uuid,
        amount: Decimal,
        currency: Currency,
        payment_method: PaymentMethod,
        fee_amount: Decimal,
        account_number: &str,
    ) -> Result<PaymentTransaction, GatewayError> {
        let now = Utc::now();
        let row = sqlx::query_as!(
            PaymentTransaction,
            r#"
            INSERT INTO payment_transactions (
                id, payment_intent_id, merchant_id, amount, currency,
                payment_method, fee_amount, account_number, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, payment_intent_id, merchant_id, amount,
                      currency as "currency: Currency",
                      payment_method as "payment_method: PaymentMethod",
                      fee_amount, account_number, third_party_reference,
                      status as "status: TransactionStatus", processed_at, created_at
            "#,
            Uuid::new_v4(),
            intent_id,
            merchant_id,
            amount,
            currency as Currency,
            payment_method as PaymentMethod,
            fee_amount,
            account_number,
            TransactionStatus::Pending as TransactionStatus,
            now,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    /// Conditional `pending -> success`, stamping `third_party_reference`
    /// and `processed_at`. This spec's simulated settlement always succeeds
    /// (§4.5 step 6); a `failed` transition has no caller in this pipeline.
    pub async fn settle(
        &self,
        transaction_id: Uuid,
        third_party_reference: &str,
    ) -> Result<PaymentTransaction, GatewayError> {
        let now = Utc::now();
        let row = sqlx::query_as!(
            PaymentTransaction,
            r#"
            UPDATE payment_transactions
            SET status = $1, third_party_reference = $2, processed_at = $3
            WHERE id = $4 AND status = $5
            RETURNING id, payment_intent_id, merchant_id, amount,
                      currency as "currency: Currency",
                      payment_method as "payment_method: PaymentMethod",
                      fee_amount, account_number, third_party_reference,
                      status as "status: TransactionStatus", processed_at, created_at
            "#,
            TransactionStatus::Success as TransactionStatus,
            third_party_reference,
            now,
            transaction_id,
            TransactionStatus::Pending as TransactionStatus,
        )
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(GatewayError::ConflictNotTransitioned)
    }

    /// UPSERTs `(merchant_id, currency)` and increments all three
    /// accumulators in one statement (§4.5 step 8 / §3 invariants).
    pub async fn update_balance(
        &self,
        merchant_id: Uuid,
        currency: Currency,
        amount: Decimal,
        fee: Decimal,
    ) -> Result<MerchantBalance, GatewayError> {
        let now = Utc::now();
        let net = amount - fee;

        let row = sqlx::query_as!(
            MerchantBalance,
            r#"
            INSERT INTO merchant_balances (
                merchant_id, currency, available_balance, total_deposit,
                total_transaction_count, last_updated
            )
            VALUES ($1, $2, $3, $4, 1, $5)
            ON CONFLICT (merchant_id, currency) DO UPDATE SET
                available_balance = merchant_balances.available_balance + EXCLUDED.available_balance,
                total_deposit = merchant_balances.total_deposit + EXCLUDED.total_deposit,
                total_transaction_count = merchant_balances.total_transaction_count + 1,
                last_updated = EXCLUDED.last_updated
            RETURNING merchant_id, currency as "currency: Currency",
                      available_balance, total_deposit, total_transaction_count, last_updated
            "#,
            merchant_id,
            currency as Currency,
            net,
            amount,
            now,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
