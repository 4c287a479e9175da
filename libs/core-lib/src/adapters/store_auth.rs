use crate::domain::user::{normalize_email, UserError};
use crate::store::{SelectQuery, Table};
use crate::{AuthIdentity, AuthProvider, CoreError, TableStore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Row of `auth_users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credentials {
    id: Uuid,
    email: String,
    password_hash: String,
    created_at: chrono::DateTime<Utc>,
}

/// Auth provider that keeps argon2 password hashes in the `auth_users` table
/// of the configured store. Used when the API runs against its own database.
#[derive(Clone)]
pub struct StoreAuth {
    store: Arc<dyn TableStore>,
}

impl StoreAuth {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    async fn find(&self, email: &str) -> Result<Option<Credentials>, CoreError> {
        let rows = self
            .store
            .select(Table::AuthUsers, &SelectQuery::new().eq("email", email).limit(1))
            .await?;
        rows.into_iter()
            .next()
            .map(serde_json::from_value::<Credentials>)
            .transpose()
            .map_err(CoreError::from)
    }
}

fn hash_password(password: &str) -> Result<String, CoreError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| CoreError::Internal(format!("Failed to encode salt: {}", e)))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, CoreError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| CoreError::Internal(format!("Stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[async_trait]
impl AuthProvider for StoreAuth {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthIdentity, CoreError> {
        let email = normalize_email(email);
        if self.find(&email).await?.is_some() {
            return Err(UserError::AlreadyExists(email).into());
        }
        let credentials = Credentials {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            created_at: Utc::now(),
        };
        let row: Value = serde_json::to_value(&credentials)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        self.store.insert(Table::AuthUsers, row).await?;
        info!(user_id = %credentials.id, "Registered credentials");
        Ok(AuthIdentity {
            id: credentials.id,
            email,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity, CoreError> {
        let email = normalize_email(email);
        let credentials = self
            .find(&email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;
        if !verify_password(password, &credentials.password_hash)? {
            return Err(UserError::InvalidCredentials.into());
        }
        Ok(AuthIdentity {
            id: credentials.id,
            email: credentials.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::in_memory_store::InMemoryStore;

    fn auth() -> (StoreAuth, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (StoreAuth::new(store.clone()), store)
    }

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let (auth, store) = auth();
        let created = auth.sign_up("Owner@Acme.test", "s3cretpass").await.unwrap();
        assert_eq!(created.email, "owner@acme.test");

        let stored = store.rows(Table::AuthUsers);
        assert!(stored[0]["password_hash"].as_str().unwrap().starts_with("$argon2"));

        let signed_in = auth.sign_in("owner@acme.test", "s3cretpass").await.unwrap();
        assert_eq!(signed_in.id, created.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (auth, _) = auth();
        auth.sign_up("owner@acme.test", "s3cretpass").await.unwrap();

        let wrong = auth.sign_in("owner@acme.test", "nope12345").await.unwrap_err();
        let unknown = auth.sign_in("ghost@acme.test", "s3cretpass").await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, CoreError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (auth, _) = auth();
        auth.sign_up("owner@acme.test", "s3cretpass").await.unwrap();
        let err = auth.sign_up("OWNER@acme.test", "s3cretpass").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists(_)));
    }
}
