use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use polystore::config::{
    Config, DatabaseConfig, DocumentConfig, KeyValueConfig, RelationalConfig, RelationalDriver,
    Toggle,
};
use polystore::db::{BackendKind, Backends, document, key_value, relational};
use polystore::router::{AppState, app_router};
use polystore::StoreError;
use serde_json::Value;
use std::{
    fs,
    net::SocketAddr,
    path::PathBuf,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tokio::net::TcpListener;
use tower::ServiceExt;

const DEADLINE: Duration = Duration::from_secs(1);
const SLACK: Duration = Duration::from_secs(2);

/// Accepts TCP connections and never writes a byte back.
async fn silent_endpoint() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

fn assert_expired_at_deadline(err: StoreError, expected: BackendKind, elapsed: Duration) {
    match err {
        StoreError::ConnectTimeout { backend, after } => {
            assert_eq!(backend, expected);
            assert_eq!(after, DEADLINE);
        }
        other => panic!("expected a connect timeout, got {other:?}"),
    }
    assert!(elapsed >= DEADLINE, "gave up early after {elapsed:?}");
    assert!(elapsed < DEADLINE + SLACK, "overran deadline: {elapsed:?}");
}

fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!(
        "polystore-{tag}-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    path
}

fn sqlite_config(path: &PathBuf) -> RelationalConfig {
    RelationalConfig {
        activate: Toggle::Yes,
        driver: RelationalDriver::Sqlite.to_string(),
        dbname: path.display().to_string(),
        connect_timeout_secs: 5,
        ..RelationalConfig::default()
    }
}

fn unreachable_key_value() -> KeyValueConfig {
    KeyValueConfig {
        activate: Toggle::Yes,
        host: "127.0.0.1".to_string(),
        port: 1,
        pool_size: 2,
        conn_ttl_secs: 1,
    }
}

fn unreachable_document() -> DocumentConfig {
    DocumentConfig {
        activate: Toggle::Yes,
        uri: "mongodb://127.0.0.1:1/".to_string(),
        conn_ttl_secs: 1,
        ..DocumentConfig::default()
    }
}

#[test]
fn unknown_driver_never_reaches_a_provider() {
    let result = Config::from_toml_str(
        r#"
        [database.relational]
        activate = "yes"
        driver = "db2"
        host = "localhost"
        user = "app"
        dbname = "app"
        "#,
    );
    assert!(matches!(result, Err(StoreError::Config(_))));
}

#[tokio::test]
async fn provider_refuses_an_unknown_driver() {
    let cfg = RelationalConfig {
        activate: Toggle::Yes,
        driver: "db2".to_string(),
        ..RelationalConfig::default()
    };
    let err = relational::connect(&cfg).await.unwrap_err();
    assert!(matches!(err, StoreError::Config(msg) if msg.contains("db2")));
}

#[tokio::test]
async fn nothing_activated_means_no_handles() {
    let backends = Backends::connect(&DatabaseConfig::default())
        .await
        .expect("empty bootstrap failed");
    assert!(backends.relational().is_none());
    assert!(backends.key_value().is_none());
    assert!(backends.document().is_none());
}

#[tokio::test]
async fn activated_sqlite_is_published() {
    let path = temp_db_path("bootstrap-sqlite");
    let cfg = DatabaseConfig {
        relational: sqlite_config(&path),
        ..DatabaseConfig::default()
    };
    let backends = Backends::connect(&cfg).await.expect("bootstrap failed");
    let db = backends.relational().expect("relational handle missing");
    assert_eq!(db.driver(), RelationalDriver::Sqlite);
    db.ping().await.expect("ping failed");

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn unreachable_key_value_fails_within_its_deadline() {
    let cfg = unreachable_key_value();
    let started = Instant::now();
    let result = key_value::connect(&cfg).await;
    assert!(result.is_err());
    assert!(started.elapsed() < cfg.connect_timeout() + Duration::from_secs(3));
}

#[tokio::test]
async fn unreachable_document_store_fails_within_its_deadline() {
    let cfg = unreachable_document();
    let started = Instant::now();
    let result = document::connect(&cfg).await;
    assert!(result.is_err());
    assert!(started.elapsed() < cfg.connect_timeout() + Duration::from_secs(3));
}

#[tokio::test]
async fn any_connect_failure_aborts_the_whole_bootstrap() {
    let path = temp_db_path("bootstrap-abort");
    let cfg = DatabaseConfig {
        relational: sqlite_config(&path),
        redis: unreachable_key_value(),
        mongodb: DocumentConfig::default(),
    };
    let result = Backends::connect(&cfg).await;
    assert!(result.is_err());

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn unreachable_relational_times_out() {
    let cfg = RelationalConfig {
        activate: Toggle::Yes,
        driver: RelationalDriver::Postgres.to_string(),
        host: "127.0.0.1".to_string(),
        port: 1,
        user: "app".to_string(),
        dbname: "app".to_string(),
        connect_timeout_secs: 1,
        ..RelationalConfig::default()
    };
    let started = Instant::now();
    let err = relational::connect(&cfg).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(matches!(
        err,
        StoreError::Database(_)
            | StoreError::ConnectTimeout {
                backend: BackendKind::Relational,
                ..
            }
    ));
}

#[tokio::test]
async fn silent_key_value_endpoint_expires_at_the_deadline() {
    let addr = silent_endpoint().await;
    let cfg = KeyValueConfig {
        activate: Toggle::Yes,
        host: addr.ip().to_string(),
        port: addr.port(),
        pool_size: 2,
        conn_ttl_secs: DEADLINE.as_secs(),
    };
    let started = Instant::now();
    let err = key_value::connect(&cfg).await.unwrap_err();
    assert_expired_at_deadline(err, BackendKind::KeyValue, started.elapsed());
}

#[tokio::test]
async fn silent_relational_endpoint_expires_at_the_deadline() {
    let addr = silent_endpoint().await;
    let cfg = RelationalConfig {
        activate: Toggle::Yes,
        driver: RelationalDriver::Postgres.to_string(),
        host: addr.ip().to_string(),
        port: addr.port(),
        user: "app".to_string(),
        dbname: "app".to_string(),
        connect_timeout_secs: DEADLINE.as_secs(),
        ..RelationalConfig::default()
    };
    let started = Instant::now();
    let err = relational::connect(&cfg).await.unwrap_err();
    assert_expired_at_deadline(err, BackendKind::Relational, started.elapsed());
}

#[tokio::test]
async fn silent_document_endpoint_expires_at_the_deadline() {
    let addr = silent_endpoint().await;
    let cfg = DocumentConfig {
        activate: Toggle::Yes,
        uri: format!("mongodb://{addr}/?directConnection=true"),
        conn_ttl_secs: DEADLINE.as_secs(),
        ..DocumentConfig::default()
    };
    let started = Instant::now();
    let err = document::connect(&cfg).await.unwrap_err();
    assert_expired_at_deadline(err, BackendKind::Document, started.elapsed());
}

#[tokio::test]
async fn reinstalling_replaces_the_held_handle() {
    let first_path = temp_db_path("reinstall-first");
    let second_path = temp_db_path("reinstall-second");
    let first = relational::connect(&sqlite_config(&first_path))
        .await
        .expect("first connect failed");
    let second = relational::connect(&sqlite_config(&second_path))
        .await
        .expect("second connect failed");
    second
        .execute("CREATE TABLE marker (id INTEGER)")
        .await
        .expect("marker table");

    let mut backends = Backends::new();
    assert!(backends.install_relational(first).is_none());
    let previous = backends.install_relational(second);
    assert!(previous.is_some());

    let current = backends.relational().expect("handle missing");
    current
        .execute("SELECT COUNT(*) FROM marker")
        .await
        .expect("getter returned the stale handle");

    let _ = fs::remove_file(&first_path);
    let _ = fs::remove_file(&second_path);
}

#[tokio::test]
async fn health_reports_installed_backends_only() {
    let path = temp_db_path("health");
    let db = relational::connect(&sqlite_config(&path))
        .await
        .expect("sqlite connect failed");
    let mut backends = Backends::new();
    backends.install_relational(db);
    let app = app_router(AppState::new(backends));

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["relational"], "up");
    assert!(body.get("key-value").is_none());
    assert!(body.get("document").is_none());

    let _ = fs::remove_file(&path);
}

#[tokio::test]
async fn relational_routes_are_absent_without_the_backend() {
    let app = app_router(AppState::new(Backends::new()));
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/register")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"a@example.com","secret":"s"}"#))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
