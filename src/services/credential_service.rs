use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto;
use crate::errors::GatewayError;
use crate::models::merchant::{ApiKeyRecord, ApiKeyStatus, Merchant, MerchantStatus};

/// Credential Store (§4.1): merchant + API-key persistence, lookup by hashed
/// key. The sole authentication path for the Intake Service.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
    hash_key: Arc<Vec<u8>>,
}

impl CredentialStore {
    pub fn new(pool: PgPool, hash_key: Arc<Vec<u8>>) -> Self {
        Self { pool, hash_key }
    }

    /// Generates a merchant id and API key with `OsRng`, stores the HMAC
    /// lookup digest and the AES-GCM ciphertext, and returns the plaintext
    /// key exactly once.
    pub async fn create_merchant(
        &self,
        name: &str,
        email: &str,
    ) -> Result<(Merchant, String), GatewayError> {
        let external_id = crypto::generate_merchant_id();
        let api_key = crypto::generate_api_key();
        let lookup_digest = crypto::hmac_digest(&self.hash_key, &api_key);
        let ciphertext = crypto::encrypt(&self.hash_key, &api_key)?;

        let mut tx = self.pool.begin().await?;

        let merchant_id = Uuid::new_v4();
        let now = Utc::now();
        let merchant = sqlx::query_as!(
            Merchant,
            r#"
            INSERT INTO merchants (id, external_id, name, email, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, external_id, name, email, status as "status: MerchantStatus", created_at
            "#,
            merchant_id,
            external_id,
            name,
            email,
            MerchantStatus::Active as MerchantStatus,
            now,
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if GatewayError::is_unique_violation(&err) {
                GatewayError::DuplicateResource("duplicate email".into())
            } else {
                GatewayError::Database(err)
            }
        })?;

        sqlx::query!(
            r#"
            INSERT INTO api_keys (id, merchant_id, lookup_digest, ciphertext, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            Uuid::new_v4(),
            merchant.id,
            lookup_digest,
            ciphertext,
            ApiKeyStatus::Active as ApiKeyStatus,
            now,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(merchant_id = %merchant.external_id, api_key = %crypto::mask_api_key(&api_key), "merchant created");

        Ok((merchant, api_key))
    }

    /// Looks up a merchant by its external id and decrypts the stored key
    /// for admin display.
    pub async fn find_by_id(&self, external_id: &str) -> Result<(Merchant, String), GatewayError> {
        let merchant = sqlx::query_as!(
            Merchant,
            r#"
            SELECT id, external_id, name, email, status as "status: MerchantStatus", created_at
            FROM merchants WHERE external_id = $1
            "#,
            external_id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GatewayError::NotFound("merchant not found".into()))?;

        let key = sqlx::query_as!(
            ApiKeyRecord,
            r#"
            SELECT id, merchant_id, lookup_digest, ciphertext, status as "status: ApiKeyStatus", created_at
            FROM api_keys WHERE merchant_id = $1
            "#,
            merchant.id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GatewayError::NotFound("merchant has no API key".into()))?;

        let plaintext = crypto::decrypt(&self.hash_key, &key.ciphertext)?;

        Ok((merchant, plaintext))
    }

    /// Resolves a merchant's external id from its internal primary key, for
    /// callers that only hold the foreign key (e.g. the worker building a
    /// callback payload).
    pub async fn external_id_of(&self, merchant_id: Uuid) -> Result<String, GatewayError> {
        sqlx::query_scalar!(
            r#"SELECT external_id FROM merchants WHERE id = $1"#,
            merchant_id,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GatewayError::NotFound("merchant not found".into()))
    }

    /// The sole authentication path: computes `HMAC(secret, api_key)` and
    /// looks it up by equality. Fails with `Authentication` when no row
    /// matches an active key belonging to an active merchant.
    pub async fn find_by_api_key(&self, api_key: &str) -> Result<Merchant, GatewayError> {
        let digest = crypto::hmac_digest(&self.hash_key, api_key);

        let merchant = sqlx::query_as!(
            Merchant,
            r#"
            SELECT m.id, m.external_id, m.name, m.email,
                   m.status as "status: MerchantStatus", m.created_at
            FROM merchants m
            JOIN api_keys ak ON ak.merchant_id = m.id
            WHERE ak.lookup_digest = $1
              AND ak.status = 'active'
              AND m.status = 'active'
            "#,
            digest,
        )
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            warn!(api_key = %crypto::mask_api_key(api_key), "API key not recognized");
            GatewayError::Authentication("invalid API key".into())
        })?;

        Ok(merchant)
    }
}
