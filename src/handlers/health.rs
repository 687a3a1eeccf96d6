use axum::{Json, extract::State, http::StatusCode};
use futures::future::OptionFuture;
use serde::Serialize;
use tracing::warn;

use crate::error::StoreError;
use crate::router::AppState;

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Up,
    Down,
}

/// Only installed backends are reported.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relational: Option<Liveness>,
    #[serde(rename = "key-value", skip_serializing_if = "Option::is_none")]
    pub key_value: Option<Liveness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Liveness>,
}

impl HealthReport {
    fn all_up(&self) -> bool {
        [self.relational, self.key_value, self.document]
            .into_iter()
            .flatten()
            .all(|l| l == Liveness::Up)
    }
}

fn liveness(backend: &str, res: Result<(), StoreError>) -> Liveness {
    match res {
        Ok(()) => Liveness::Up,
        Err(e) => {
            warn!(backend, error = %e, "health ping failed");
            Liveness::Down
        }
    }
}

/// GET /api/v1/health -> pings every installed backend concurrently.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let backends = &state.backends;

    let relational: OptionFuture<_> = backends.relational().map(|db| db.ping()).into();
    let key_value: OptionFuture<_> = backends.key_value().map(|kv| kv.ping()).into();
    let document: OptionFuture<_> = backends.document().map(|doc| doc.ping()).into();

    let (relational, key_value, document) = futures::join!(relational, key_value, document);

    let report = HealthReport {
        relational: relational.map(|r| liveness("relational", r)),
        key_value: key_value.map(|r| liveness("key-value", r)),
        document: document.map(|r| liveness("document", r)),
    };
    let status = if report.all_up() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
