use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use crate::models::transaction::CallbackPayload;

const USER_AGENT: &str = "CashFlow-Financial/1.0";
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback Dispatcher (§4.6): one-shot HTTP POST of the terminal outcome to
/// the merchant-supplied URL. Non-2xx responses and transport errors are
/// logged, never propagated — the caller's ack/nack decision is unaffected.
#[derive(Clone)]
pub struct CallbackDispatcher {
    client: Client,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        Self { client }
    }

    pub async fn send(&self, url: &str, payload: &CallbackPayload) {
        info!(callback_url = url, payment_intent_id = %payload.payment_intent_id, "sending callback");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .json(payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!(callback_url = url, status = %resp.status(), "callback delivered");
            }
            Ok(resp) => {
                warn!(callback_url = url, status = %resp.status(), "callback returned non-2xx");
            }
            Err(err) => {
                warn!(callback_url = url, error = %err, "callback request failed");
            }
        }
    }
}

impl Default for CallbackDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
