//! Account creation: one live credential per email address.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{error, info};

use crate::db::{AuthStorage, CredentialRecord, NewCredential, Relational};
use crate::error::{StoreError, codes};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern must compile")
});

/// Register request body. Fields other than these are dropped on parse.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(alias = "password")]
    pub secret: String,
}

impl From<RegisterRequest> for NewCredential {
    fn from(req: RegisterRequest) -> Self {
        Self {
            email: req.email,
            secret: req.secret,
        }
    }
}

pub fn is_email_valid(email: &str) -> bool {
    email.len() >= 3 && email.len() <= 254 && EMAIL_RE.is_match(email)
}

/// Validate, pre-check and insert a new credential.
///
/// Nothing touches storage until the payload and email format pass. The
/// pre-check only yields an early, friendly rejection; the schema's live-email
/// constraint is what holds under concurrent registrations.
pub async fn create_account(
    db: &Relational,
    req: RegisterRequest,
) -> Result<CredentialRecord, StoreError> {
    if req.secret.is_empty() {
        return Err(StoreError::BadRequest);
    }
    if !is_email_valid(&req.email) {
        return Err(StoreError::InvalidEmail);
    }

    let storage = AuthStorage::new(db.clone());
    if storage.find_live_by_email(&req.email).await?.is_some() {
        return Err(StoreError::EmailTaken);
    }

    match storage.insert(NewCredential::from(req)).await {
        Ok(record) => {
            info!(auth_id = record.auth_id, "account created");
            Ok(record)
        }
        Err(StoreError::EmailTaken) => Err(StoreError::EmailTaken),
        Err(e) => {
            error!(code = codes::CREDENTIAL_INSERT, error = %e, "credential insert failed");
            Err(e)
        }
    }
}
