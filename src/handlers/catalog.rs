use axum::{Json, extract::State};

use crate::db::{Hobby, Post, catalog};
use crate::error::StoreError;
use crate::router::AppState;

/// GET /api/v1/posts
pub async fn list_posts_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, StoreError> {
    Ok(Json(catalog::list_posts(state.relational()?).await?))
}

/// GET /api/v1/hobbies
pub async fn list_hobbies_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Hobby>>, StoreError> {
    Ok(Json(catalog::list_hobbies(state.relational()?).await?))
}
