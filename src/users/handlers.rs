use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    error::AppResult,
    state::AppState,
    users::{
        dto::{ApiResponse, ListQuery, PaginationMeta, UpdateUser},
        repo_types::PublicUser,
    },
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<Vec<PublicUser>>>> {
    let page = state.auth.list_users(q.page, q.limit).await?;
    let meta = PaginationMeta::from(&page);
    Ok(Json(
        ApiResponse::ok("Users retrieved successfully", page.items).with_pagination(meta),
    ))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let user = state.auth.get_user(id).await?;
    Ok(Json(ApiResponse::ok("User retrieved successfully", user)))
}

#[instrument(skip(state, caller, body), fields(caller = %caller.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUser>,
) -> AppResult<Json<ApiResponse<PublicUser>>> {
    let user = state.auth.update_user(id, body).await?;
    Ok(Json(ApiResponse::ok("User updated successfully", user)))
}

#[instrument(skip(state, caller), fields(caller = %caller.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.auth.delete_user(id).await?;
    Ok(Json(ApiResponse::message("User deleted successfully")))
}
