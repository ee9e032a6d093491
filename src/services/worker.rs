use futures_util::StreamExt;
use lapin::Consumer;
use rand::rngs::OsRng;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::crypto;
use crate::models::intent::{IntentStatus, WorkerMessage};
use crate::models::transaction::{CallbackPayload, PaymentMethod};
use crate::services::broker::{ack, nack};
use crate::services::callback_service::CallbackDispatcher;
use crate::services::credential_service::CredentialStore;
use crate::services::intent_service::IntentStore;
use crate::services::transaction_service::TransactionStore;

const FEE_RATE: &str = "0.01";

/// Processing Worker (§4.5): one task per consumer, `prefetch_count=1`,
/// manual ack/nack. This is where a payment intent actually becomes a
/// settled transaction and a balance update.
pub struct Worker {
    intents: Arc<IntentStore>,
    transactions: Arc<TransactionStore>,
    credentials: Arc<CredentialStore>,
    callbacks: Arc<CallbackDispatcher>,
}

impl Worker {
    pub fn new(
        intents: Arc<IntentStore>,
        transactions: Arc<TransactionStore>,
        credentials: Arc<CredentialStore>,
        callbacks: Arc<CallbackDispatcher>,
    ) -> Self {
        Self {
            intents,
            transactions,
            credentials,
            callbacks,
        }
    }

    /// Runs until the consumer stream ends (connection dropped or process
    /// shutdown). Each delivery is handled to completion before the next is
    /// pulled, matching `prefetch_count=1`.
    pub async fn run(&self, mut consumer: Consumer) {
        while let Some(delivery) = consumer.next().await {
            match delivery {
                Ok(delivery) => {
                    self.handle_delivery(&delivery).await;
                }
                Err(err) => {
                    error!(error = %err, "consumer stream error");
                }
            }
        }
        warn!("consumer stream ended, worker exiting");
    }

    async fn handle_delivery(&self, delivery: &lapin::message::Delivery) {
        let message: WorkerMessage = match serde_json::from_slice(&delivery.data) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "malformed worker message, dropping");
                let _ = nack(delivery, false).await;
                return;
            }
        };

        match self.process(&message).await {
            Ok(()) => {
                let _ = ack(delivery).await;
            }
            Err(crate::errors::GatewayError::NotFound(_)) => {
                warn!(payment_intent_id = %message.payment_intent_id, "intent not found, dropping message");
                let _ = nack(delivery, false).await;
            }
            Err(err) => {
                error!(payment_intent_id = %message.payment_intent_id, error = %err, "processing failed, requeuing for retry");
                let _ = nack(delivery, true).await;
            }
        }
    }

    async fn process(&self, message: &WorkerMessage) -> Result<(), crate::errors::GatewayError> {
        let intent = self.intents.get_intent(&message.payment_intent_id).await?;

        // Guard A: anything already being handled or past `pending` is a
        // redelivery (broker retry, worker restart) — a no-op, not an error.
        if intent.status != IntentStatus::Pending {
            info!(payment_intent_id = %intent.external_id, status = ?intent.status, "ignoring redelivered message for non-pending intent");
            return Ok(());
        }

        let claimed = self
            .intents
            .transition_intent(intent.id, IntentStatus::Pending, IntentStatus::Processing)
            .await;
        let intent = match claimed {
            Ok(intent) => intent,
            Err(crate::errors::GatewayError::ConflictNotTransitioned) => {
                info!(payment_intent_id = %intent.external_id, "lost the claim race, another worker has it");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        info!(payment_intent_id = %intent.external_id, "claimed intent, processing");

        let fee_amount = round_half_even(intent.amount * FEE_RATE.parse::<Decimal>().unwrap());
        let payment_method = random_payment_method();
        let account_number = format!(
            "{}{}",
            payment_method.account_prefix(),
            crypto::generate_account_digits()
        );

        let transaction = self
            .transactions
            .insert_pending(
                intent.id,
                intent.merchant_id,
                intent.amount,
                intent.currency,
                payment_method,
                fee_amount,
                &account_number,
            )
            .await?;

        let third_party_reference = crypto::generate_third_party_reference();
        let transaction = self
            .transactions
            .settle(transaction.id, &third_party_reference)
            .await?;

        let intent = self
            .intents
            .transition_intent(intent.id, IntentStatus::Processing, IntentStatus::Success)
            .await?;

        // A balance-update failure here is retried via requeue rather than
        // silently dropped — the transaction is already settled, so losing
        // this step would leave the merchant's ledger permanently short
        // (§4.5 step 8 / §4.7).
        self.transactions
            .update_balance(intent.merchant_id, intent.currency, intent.amount, fee_amount)
            .await?;

        info!(payment_intent_id = %intent.external_id, "settled transaction and updated balance");

        let merchant_external_id = self.credentials.external_id_of(intent.merchant_id).await?;

        let payload = CallbackPayload {
            payment_intent_id: intent.external_id.clone(),
            merchant_id: merchant_external_id,
            amount: intent.amount,
            currency: intent.currency,
            status: "success",
            account_number: transaction.account_number.clone(),
            payment_method: transaction.payment_method,
            third_party_reference: transaction
                .third_party_reference
                .clone()
                .unwrap_or_default(),
            fee_amount,
            processed_at: transaction.processed_at.unwrap_or(transaction.created_at),
            nonce: intent.nonce.clone(),
            metadata: intent.metadata.clone(),
        };

        self.callbacks.send(&intent.callback_url, &payload).await;

        Ok(())
    }
}

/// Half-to-even rounding at 2 decimal places (§4.5 step 4) — the original's
/// float-based `%.2f` rounding is a bug this spec deliberately does not
/// carry forward.
fn round_half_even(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

fn random_payment_method() -> PaymentMethod {
    let index = OsRng.gen_range(0..PaymentMethod::ALL.len());
    PaymentMethod::ALL[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_half_even(dec!(100.125)), dec!(100.12));
        assert_eq!(round_half_even(dec!(100.135)), dec!(100.14));
    }

    #[test]
    fn account_prefix_distinguishes_mpesa() {
        assert_eq!(PaymentMethod::Mpesa.account_prefix(), "2517");
        assert_eq!(PaymentMethod::Cbe.account_prefix(), "2519");
        assert_eq!(PaymentMethod::Telebirr.account_prefix(), "2519");
        assert_eq!(PaymentMethod::Awash.account_prefix(), "2519");
    }
}
