use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "merchant_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MerchantStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "api_key_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
}

/// Row in `merchants`. `external_id` (`CASM-...`) is the identifier handed to
/// the outside world; `id` is the internal primary key every other table
/// joins on.
#[derive(Debug, Clone, FromRow)]
pub struct Merchant {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub status: MerchantStatus,
    pub created_at: DateTime<Utc>,
}

/// Row in `api_keys`. Holds only the lookup digest and ciphertext — the
/// plaintext key is never persisted (§3 APIKey invariant).
#[derive(Debug, Clone, FromRow)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub lookup_digest: String,
    pub ciphertext: String,
    pub status: ApiKeyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMerchantRequest {
    #[validate(length(min = 2, max = 100, message = "name must be between 2 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "invalid email format"), length(max = 255, message = "email must be at most 255 characters"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateMerchantResponse {
    pub status: bool,
    pub merchant_id: String,
    pub name: String,
    pub email: String,
    pub api_key: String,
    pub message: String,
}

/// Admin read view (`GET /account/merchant`) — includes the decrypted key.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantView {
    pub status: bool,
    pub merchant_id: String,
    pub name: String,
    pub email: String,
    pub merchant_status: MerchantStatus,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}
