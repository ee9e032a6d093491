use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

use crate::errors::GatewayError;
use crate::models::intent::{Currency, IntentCreatedMessage, IntentResponse, CreateIntentRequest};
use crate::services::broker::Publisher;
use crate::services::credential_service::CredentialStore;
use crate::services::intent_service::IntentStore;

const MAX_AMOUNT: &str = "100000";

/// Intake Service (§4.4): authenticates the merchant, validates the
/// request, creates or looks up the intent idempotently, and publishes to
/// the broker exactly once per newly created intent.
pub struct IntakeService {
    credentials: Arc<CredentialStore>,
    intents: Arc<IntentStore>,
    publisher: Arc<Publisher>,
}

impl IntakeService {
    pub fn new(
        credentials: Arc<CredentialStore>,
        intents: Arc<IntentStore>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            credentials,
            intents,
            publisher,
        }
    }

    pub async fn create_intent(
        &self,
        api_key: &str,
        req: CreateIntentRequest,
    ) -> Result<IntentResponse, GatewayError> {
        let merchant = self.credentials.find_by_api_key(api_key).await?;

        let currency = validate_create_intent_request(&req)?;

        let (intent, created) = self
            .intents
            .get_or_create_intent(
                merchant.id,
                req.amount,
                currency,
                req.description.as_deref(),
                &req.callback_url,
                &req.nonce,
                req.metadata.as_ref(),
            )
            .await?;

        if created {
            let message = IntentCreatedMessage {
                payment_intent_id: intent.external_id.clone(),
                merchant_id: merchant.external_id.clone(),
                amount: intent.amount.to_string(),
                currency: intent.currency,
                timestamp: intent.created_at,
            };

            if let Err(err) = self.publisher.publish(&message).await {
                // Logged, not rolled back: the intent stays `pending` and is
                // recoverable by a future mechanism (§4.3, §9).
                warn!(
                    payment_intent_id = %intent.external_id,
                    error = %err,
                    "failed to publish payment intent message"
                );
            } else {
                info!(payment_intent_id = %intent.external_id, "published payment intent message");
            }
        }

        let message = if created {
            "Payment intent created successfully"
        } else {
            "Payment intent already exists"
        };

        Ok(IntentResponse {
            status: true,
            payment_intent_id: intent.external_id,
            merchant_id: merchant.external_id,
            amount: intent.amount,
            currency: intent.currency,
            payment_status: intent.status,
            description: intent.description,
            created_at: intent.created_at,
            expires_at: intent.expires_at,
            message: message.to_string(),
        })
    }
}

/// Runs `validator`-derived field checks plus the amount/currency rules
/// spec.md adds on top (§4.4 step 2), collecting every violation the way
/// the original's `validateCreatePaymentIntentRequest` does.
fn validate_create_intent_request(req: &CreateIntentRequest) -> Result<Currency, GatewayError> {
    let mut messages = Vec::new();

    if let Err(errs) = req.validate() {
        for (_, field_errors) in errs.field_errors() {
            for err in field_errors {
                if let Some(msg) = &err.message {
                    messages.push(msg.to_string());
                }
            }
        }
    }

    if req.amount <= Decimal::ZERO {
        messages.push("amount must be greater than 0".to_string());
    } else if req.amount > MAX_AMOUNT.parse::<Decimal>().unwrap() {
        messages.push("amount cannot exceed 100,000".to_string());
    }

    let currency = Currency::parse(&req.currency);
    if currency.is_none() {
        messages.push("currency must be one of: ETB, USD".to_string());
    }

    if !messages.is_empty() {
        return Err(GatewayError::Validation(messages.join("; ")));
    }

    Ok(currency.expect("validated above"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> CreateIntentRequest {
        CreateIntentRequest {
            amount: dec!(100.00),
            currency: "ETB".to_string(),
            description: None,
            callback_url: "http://merchant.example/cb".to_string(),
            nonce: "n_0123456789abcdef".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn accepts_a_valid_request() {
        assert!(validate_create_intent_request(&sample()).is_ok());
    }

    #[test]
    fn rejects_zero_amount() {
        let mut req = sample();
        req.amount = dec!(0);
        let err = validate_create_intent_request(&req).unwrap_err();
        assert!(err.to_string().contains("amount must be greater than 0"));
    }

    #[test]
    fn rejects_unknown_currency() {
        let mut req = sample();
        req.currency = "JPY".to_string();
        let err = validate_create_intent_request(&req).unwrap_err();
        assert!(err.to_string().contains("currency must be one of"));
    }

    #[test]
    fn rejects_short_nonce() {
        let mut req = sample();
        req.nonce = "short".to_string();
        assert!(validate_create_intent_request(&req).is_err());
    }
}
