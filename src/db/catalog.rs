//! Read-side queries for posts and hobbies.

use crate::db::relational::on_pool;
use crate::db::{Hobby, Post, Relational};
use crate::error::StoreError;

const LIST_POSTS: &str = r#"
    SELECT post_id, created_at, updated_at, deleted_at, title, body, id_user
    FROM posts WHERE deleted_at IS NULL ORDER BY post_id"#;

const LIST_HOBBIES: &str = r#"
    SELECT hobby_id, created_at, updated_at, deleted_at, hobby
    FROM hobbies WHERE deleted_at IS NULL ORDER BY hobby_id"#;

pub async fn list_posts(db: &Relational) -> Result<Vec<Post>, StoreError> {
    let rows = on_pool!(db.pool(), |p| sqlx::query_as::<_, Post>(LIST_POSTS)
        .fetch_all(p)
        .await)?;
    Ok(rows)
}

pub async fn list_hobbies(db: &Relational) -> Result<Vec<Hobby>, StoreError> {
    let rows = on_pool!(db.pool(), |p| sqlx::query_as::<_, Hobby>(LIST_HOBBIES)
        .fetch_all(p)
        .await)?;
    Ok(rows)
}
