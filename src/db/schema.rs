//! SQL DDL for the managed tables, one flavour per relational engine, and
//! the entry points the migration tool drives.
//!
//! Live-email uniqueness is a schema constraint on every engine:
//! - SQLite / Postgres: partial unique index over `email WHERE deleted_at IS NULL`
//! - MySQL: unique index over a stored generated column that is NULL once deleted

use tracing::info;

use crate::config::RelationalDriver;
use crate::db::Relational;
use crate::error::StoreError;

/// Drop order respects references: join table first, `auths` last.
pub const MANAGED_TABLES: [&str; 5] = ["user_hobbies", "hobbies", "posts", "users", "auths"];

pub const SQLITE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS auths (
    auth_id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL, -- RFC3339
    updated_at TEXT NOT NULL,
    deleted_at TEXT NULL,
    email TEXT NOT NULL,
    secret TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_auths_live_email ON auths(email) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_auths_deleted_at ON auths(deleted_at);

CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    id_auth INTEGER NULL
);
CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users(deleted_at);

CREATE TABLE IF NOT EXISTS posts (
    post_id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    id_user INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_deleted_at ON posts(deleted_at);

CREATE TABLE IF NOT EXISTS hobbies (
    hobby_id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT NULL,
    hobby TEXT NOT NULL UNIQUE
);
CREATE INDEX IF NOT EXISTS idx_hobbies_deleted_at ON hobbies(deleted_at);

CREATE TABLE IF NOT EXISTS user_hobbies (
    user_user_id INTEGER NOT NULL,
    hobby_hobby_id INTEGER NOT NULL,
    PRIMARY KEY (user_user_id, hobby_hobby_id)
)
"#;

pub const POSTGRES_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS auths (
    auth_id BIGSERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ NULL,
    email TEXT NOT NULL,
    secret TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_auths_live_email ON auths(email) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_auths_deleted_at ON auths(deleted_at);

CREATE TABLE IF NOT EXISTS users (
    user_id BIGSERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ NULL,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    id_auth BIGINT NULL
);
CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users(deleted_at);

CREATE TABLE IF NOT EXISTS posts (
    post_id BIGSERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    id_user BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_posts_deleted_at ON posts(deleted_at);

CREATE TABLE IF NOT EXISTS hobbies (
    hobby_id BIGSERIAL PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    deleted_at TIMESTAMPTZ NULL,
    hobby TEXT NOT NULL UNIQUE
);
CREATE INDEX IF NOT EXISTS idx_hobbies_deleted_at ON hobbies(deleted_at);

CREATE TABLE IF NOT EXISTS user_hobbies (
    user_user_id BIGINT NOT NULL REFERENCES users(user_id),
    hobby_hobby_id BIGINT NOT NULL REFERENCES hobbies(hobby_id),
    PRIMARY KEY (user_user_id, hobby_hobby_id)
)
"#;

pub const MYSQL_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS auths (
    auth_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at DATETIME(6) NOT NULL,
    updated_at DATETIME(6) NOT NULL,
    deleted_at DATETIME(6) NULL,
    email VARCHAR(255) NOT NULL,
    secret VARCHAR(255) NOT NULL,
    live_email VARCHAR(255) GENERATED ALWAYS AS (CASE WHEN deleted_at IS NULL THEN email END) STORED,
    UNIQUE KEY idx_auths_live_email (live_email),
    KEY idx_auths_deleted_at (deleted_at)
) ENGINE=InnoDB;

CREATE TABLE IF NOT EXISTS users (
    user_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at DATETIME(6) NOT NULL,
    updated_at DATETIME(6) NOT NULL,
    deleted_at DATETIME(6) NULL,
    first_name VARCHAR(255) NOT NULL,
    last_name VARCHAR(255) NOT NULL,
    id_auth BIGINT NULL,
    KEY idx_users_deleted_at (deleted_at)
) ENGINE=InnoDB;

CREATE TABLE IF NOT EXISTS posts (
    post_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at DATETIME(6) NOT NULL,
    updated_at DATETIME(6) NOT NULL,
    deleted_at DATETIME(6) NULL,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    id_user BIGINT NOT NULL,
    KEY idx_posts_deleted_at (deleted_at)
) ENGINE=InnoDB;

CREATE TABLE IF NOT EXISTS hobbies (
    hobby_id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    created_at DATETIME(6) NOT NULL,
    updated_at DATETIME(6) NOT NULL,
    deleted_at DATETIME(6) NULL,
    hobby VARCHAR(255) NOT NULL,
    UNIQUE KEY idx_hobbies_hobby (hobby),
    KEY idx_hobbies_deleted_at (deleted_at)
) ENGINE=InnoDB;

CREATE TABLE IF NOT EXISTS user_hobbies (
    user_user_id BIGINT NOT NULL,
    hobby_hobby_id BIGINT NOT NULL,
    PRIMARY KEY (user_user_id, hobby_hobby_id),
    CONSTRAINT fk_user_hobbies_user FOREIGN KEY (user_user_id) REFERENCES users(user_id),
    CONSTRAINT fk_user_hobbies_hobby FOREIGN KEY (hobby_hobby_id) REFERENCES hobbies(hobby_id)
) ENGINE=InnoDB
"#;

/// Explicit relations for the networked engines; the embedded engine runs
/// without referential integrity.
pub const FOREIGN_KEYS: &str = r#"
ALTER TABLE users ADD CONSTRAINT fk_auths_user FOREIGN KEY (id_auth) REFERENCES auths(auth_id);
ALTER TABLE posts ADD CONSTRAINT fk_users_posts FOREIGN KEY (id_user) REFERENCES users(user_id)
"#;

pub fn tables_for(driver: RelationalDriver) -> &'static str {
    match driver {
        RelationalDriver::MySql => MYSQL_TABLES,
        RelationalDriver::Postgres => POSTGRES_TABLES,
        RelationalDriver::Sqlite => SQLITE_TABLES,
    }
}

/// Drop every managed table. Destroys all data.
pub async fn drop_all(db: &Relational) -> Result<(), StoreError> {
    let cascade = match db.driver() {
        RelationalDriver::Postgres => " CASCADE",
        RelationalDriver::MySql | RelationalDriver::Sqlite => "",
    };
    for table in MANAGED_TABLES {
        db.execute(&format!("DROP TABLE IF EXISTS {table}{cascade}"))
            .await?;
    }
    info!("Old tables are deleted!");
    Ok(())
}

/// Create every managed table for the handle's engine.
pub async fn create_all(db: &Relational) -> Result<(), StoreError> {
    db.execute_batch(tables_for(db.driver())).await?;
    info!("New tables are migrated successfully!");
    Ok(())
}

/// Add the cross-table foreign keys. A no-op on the embedded engine.
pub async fn add_constraints(db: &Relational) -> Result<(), StoreError> {
    if db.driver().is_embedded() {
        return Ok(());
    }
    db.execute_batch(FOREIGN_KEYS).await?;
    info!("Foreign keys are created!");
    Ok(())
}

/// Drop and recreate everything, stopping at the first failure.
pub async fn reset(db: &Relational) -> Result<(), StoreError> {
    drop_all(db).await?;
    create_all(db).await?;
    add_constraints(db).await
}
