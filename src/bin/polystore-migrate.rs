//! Drops and recreates every managed table. Run only when required.

use std::process::ExitCode;

use tracing::error;

use polystore::Config;
use polystore::db::{relational, schema};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    polystore::telemetry::init(&cfg.loglevel, cfg.log_format());

    let db = match relational::connect(&cfg.database.relational).await {
        Ok(db) => db,
        Err(_) => return ExitCode::FAILURE,
    };

    // Every step runs; any failure marks the whole run failed.
    let mut failed = false;
    if let Err(e) = schema::drop_all(&db).await {
        error!(error = %e, "dropping tables failed");
        failed = true;
    }
    if let Err(e) = schema::create_all(&db).await {
        error!(error = %e, "creating tables failed");
        failed = true;
    }
    if let Err(e) = schema::add_constraints(&db).await {
        error!(error = %e, "adding foreign keys failed");
        failed = true;
    }
    db.close().await;

    if failed {
        println!("Auto migration failed!");
        ExitCode::FAILURE
    } else {
        println!("Auto migration is completed!");
        ExitCode::SUCCESS
    }
}
