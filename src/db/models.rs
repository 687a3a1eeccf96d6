use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One registered login identity (`auths` table).
///
/// The secret is stored exactly as received; hashing belongs to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct CredentialRecord {
    pub auth_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub email: String,
    pub secret: String,
}

/// The only caller-controlled fields that ever reach the `auths` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub email: String,
    pub secret: String,
}

impl NewCredential {
    pub fn into_record(self, auth_id: i64, now: DateTime<Utc>) -> CredentialRecord {
        CredentialRecord {
            auth_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            email: self.email,
            secret: self.secret,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Post {
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub title: String,
    pub body: String,
    #[serde(skip)]
    pub id_user: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct Hobby {
    pub hobby_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub hobby: String,
}
