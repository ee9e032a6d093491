use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

use crate::errors::GatewayError;
use crate::models::intent::CreateIntentRequest;
use crate::AppState;

fn extract_api_key(req: &HttpRequest) -> Result<&str, GatewayError> {
    req.headers()
        .get("X-API-KEY")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| GatewayError::Authentication("missing X-API-KEY header".into()))
}

pub async fn create_intent(
    req: HttpRequest,
    data: web::Json<CreateIntentRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let api_key = extract_api_key(&req)?;

    info!(amount = %data.amount, currency = %data.currency, "creating payment intent");

    let response = state
        .intake
        .create_intent(api_key, data.into_inner())
        .await?;

    Ok(HttpResponse::Created().json(response))
}
