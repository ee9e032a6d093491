use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::GatewayError;
use crate::models::merchant::{CreateMerchantRequest, CreateMerchantResponse, MerchantView};
use crate::AppState;

pub async fn create_merchant(
    data: web::Json<CreateMerchantRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    data.validate()?;

    info!(email = %data.email, "creating merchant");

    let (merchant, api_key) = state
        .credentials
        .create_merchant(&data.name, &data.email)
        .await?;

    Ok(HttpResponse::Created().json(CreateMerchantResponse {
        status: true,
        merchant_id: merchant.external_id,
        name: merchant.name,
        email: merchant.email,
        api_key,
        message: "Merchant created successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct GetMerchantQuery {
    pub merchant_id: String,
}

pub async fn get_merchant(
    query: web::Query<GetMerchantQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GatewayError> {
    let (merchant, api_key) = state.credentials.find_by_id(&query.merchant_id).await?;

    Ok(HttpResponse::Ok().json(MerchantView {
        status: true,
        merchant_id: merchant.external_id,
        name: merchant.name,
        email: merchant.email,
        merchant_status: merchant.status,
        api_key,
        created_at: merchant.created_at,
    }))
}
