//! Document-store connection provider (MongoDB).

use mongodb::bson::doc;
use mongodb::error::ErrorKind;
use mongodb::event::EventHandler;
use mongodb::event::cmap::CmapEvent;
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Database};
use tracing::{debug, error, info};

use crate::config::DocumentConfig;
use crate::db::BackendKind;
use crate::error::{StoreError, codes};

/// Pooled document-store client. The driver pools internally.
#[derive(Debug, Clone)]
pub struct Document {
    client: Client,
}

impl Document {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}

/// Logs connection check-out / check-in. Observes only.
fn pool_monitor() -> EventHandler<CmapEvent> {
    EventHandler::callback(|event: CmapEvent| match event {
        CmapEvent::ConnectionCheckedOut(ev) => {
            debug!(address = %ev.address, connection_id = ev.connection_id, "GetSucceeded");
        }
        CmapEvent::ConnectionCheckedIn(ev) => {
            debug!(address = %ev.address, connection_id = ev.connection_id, "ConnectionReturned");
        }
        _ => {}
    })
}

async fn client_options(cfg: &DocumentConfig) -> Result<ClientOptions, StoreError> {
    let deadline = cfg.connect_timeout();
    let mut options = ClientOptions::parse(cfg.uri.as_str()).await?;
    options.max_pool_size = Some(cfg.pool_size);
    options.app_name = Some(cfg.app_name.clone());
    options.connect_timeout = Some(deadline);
    options.server_selection_timeout = Some(deadline);
    options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
    if cfg.pool_mon.is_on() {
        options.cmap_event_handler = Some(pool_monitor());
    }
    Ok(options)
}

/// Build a client against `cfg.uri` and confirm the deployment answers a ping.
pub async fn connect(cfg: &DocumentConfig) -> Result<Document, StoreError> {
    let deadline = cfg.connect_timeout();

    let attempt = async {
        let options = client_options(cfg).await?;
        let client = Client::with_options(options)?;
        let handle = Document { client };
        handle.ping().await?;
        Ok::<_, StoreError>(handle)
    };

    let expired = StoreError::ConnectTimeout {
        backend: BackendKind::Document,
        after: deadline,
    };
    // Server selection only gives up once `server_selection_timeout` elapses.
    let result = match tokio::time::timeout(deadline, attempt).await {
        Ok(Err(StoreError::Document(e))) if matches!(*e.kind, ErrorKind::ServerSelection { .. }) => {
            Err(expired)
        }
        Ok(res) => res,
        Err(_) => Err(expired),
    };

    let handle = result.inspect_err(|e| {
        error!(
            code = codes::DOCUMENT_CONNECT,
            app_name = %cfg.app_name,
            error = %e,
            "document store connection failed"
        );
    })?;

    info!(
        app_name = %cfg.app_name,
        pool_size = cfg.pool_size,
        "MongoDB pool connection successful!"
    );
    Ok(handle)
}
