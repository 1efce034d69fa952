//! REST API layer for Blink Motors using Axum.
//!
//! Every handler is a single store operation. Routes that need a signed caller
//! sit behind [`require_auth`]; promoting a user additionally goes through the
//! role escalation gate ([`require_admin`]).

use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::auth::{is_admin, require_admin, require_auth, TokenService};
use crate::error::{AppError, Result};
use crate::models::{
    AdminStatus, Claims, DeleteResult, Document, InsertOneResult, LoginResponse, UpdateResult,
};
use crate::storage::{Collection, Storage};

/// Shared app state for REST handlers. Cheap to clone: the store handle and
/// the token service are shared by every request.
#[derive(Clone)]
pub struct AppState {
    storage: Storage,
    tokens: Arc<TokenService>,
    port: u16,
}

impl AppState {
    pub fn new(storage: Storage, tokens: TokenService, port: u16) -> Self {
        Self {
            storage,
            tokens: Arc::new(tokens),
            port,
        }
    }
}

/// Create the Axum router for the whole HTTP surface.
pub fn create_router(state: AppState) -> Router {
    let tokens = state.tokens.clone();
    let guard = || middleware::from_fn_with_state(tokens.clone(), require_auth);

    Router::new()
        .route("/", get(health_handler))
        .route("/admin/:email", get(admin_status_handler))
        .route("/admin/blog", post(insert_blog_handler).route_layer(guard()))
        .route(
            "/product",
            get(list_products_handler).merge(post(insert_product_handler).route_layer(guard())),
        )
        .route("/product/:id", get(get_product_handler).route_layer(guard()))
        .route("/user", get(list_users_handler).route_layer(guard()))
        .route("/user/:email", put(upsert_user_handler))
        .route(
            "/user/profile/:email",
            get(get_profile_handler).put(update_profile_handler).route_layer(guard()),
        )
        .route("/user/admin/:email", put(make_admin_handler).route_layer(guard()))
        .route(
            "/user/review",
            get(list_reviews_handler).merge(post(insert_review_handler).route_layer(guard())),
        )
        .route("/user/blog", get(list_blogs_handler))
        .route(
            "/order",
            get(list_orders_handler).post(insert_order_handler).route_layer(guard()),
        )
        // `:key` is an email for GET and an order id for DELETE.
        .route(
            "/order/:key",
            get(orders_by_email_handler).delete(delete_order_handler).route_layer(guard()),
        )
        .route("/order/admin/:id", put(confirm_order_handler).route_layer(guard()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid id `{raw}`")))
}

/// Role changes only go through `PUT /user/admin/:email`.
fn strip_role(mut body: Document) -> Document {
    if body.remove("role").is_some() {
        tracing::warn!("ignoring role field in profile update");
    }
    body
}

async fn health_handler(State(state): State<AppState>) -> String {
    format!("Server running on port {}", state.port)
}

// --- Users ---

/// Upsert the identity for `email` and hand back a fresh token.
async fn upsert_user_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(body): Json<Document>,
) -> Result<Json<LoginResponse>> {
    let result = state.storage.upsert_identity(&email, &strip_role(body))?;
    let token = state.tokens.issue(&email)?;
    tracing::info!(%email, created = result.upserted_count == 1, "token issued");
    Ok(Json(LoginResponse { result, token }))
}

async fn admin_status_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<AdminStatus>> {
    let admin = is_admin(&state.storage, &email).await?;
    Ok(Json(AdminStatus { admin }))
}

async fn list_users_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.storage.find_all(Collection::Users)?))
}

async fn get_profile_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Document>> {
    state
        .storage
        .find_identity_document(&email)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no user with email {email}")))
}

async fn update_profile_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(body): Json<Document>,
) -> Result<Json<UpdateResult>> {
    Ok(Json(state.storage.upsert_identity(&email, &strip_role(body))?))
}

/// Promote `email` to admin. The caller, not the target, must already be one.
async fn make_admin_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(email): Path<String>,
) -> Result<Json<UpdateResult>> {
    require_admin(&state.storage, &claims).await?;

    let mut fields = Document::new();
    fields.insert("role".to_string(), Value::String("admin".to_string()));
    let result = state.storage.update_identity(&email, &fields)?;
    tracing::info!(
        requester = %claims.email,
        target = %email,
        matched = result.matched_count,
        "admin role granted"
    );
    Ok(Json(result))
}

// --- Products ---

async fn list_products_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.storage.find_all(Collection::Products)?))
}

async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>> {
    let id = parse_id(&id)?;
    state
        .storage
        .find_by_id(Collection::Products, &id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no product with id {id}")))
}

async fn insert_product_handler(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> Result<Json<InsertOneResult>> {
    Ok(Json(state.storage.insert_one(Collection::Products, body)?))
}

// --- Reviews and blogs ---

async fn list_reviews_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.storage.find_all(Collection::Reviews)?))
}

async fn insert_review_handler(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> Result<Json<InsertOneResult>> {
    Ok(Json(state.storage.insert_one(Collection::Reviews, body)?))
}

async fn list_blogs_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.storage.find_all(Collection::Blogs)?))
}

async fn insert_blog_handler(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> Result<Json<InsertOneResult>> {
    Ok(Json(state.storage.insert_one(Collection::Blogs, body)?))
}

// --- Orders ---

async fn list_orders_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.storage.find_all(Collection::Orders)?))
}

async fn orders_by_email_handler(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Vec<Document>>> {
    let orders = state
        .storage
        .find_where(Collection::Orders, "email", &Value::String(email))?;
    Ok(Json(orders))
}

async fn insert_order_handler(
    State(state): State<AppState>,
    Json(body): Json<Document>,
) -> Result<Json<InsertOneResult>> {
    Ok(Json(state.storage.insert_one(Collection::Orders, body)?))
}

async fn delete_order_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>> {
    let id = parse_id(&id)?;
    let result = state.storage.delete_by_id(Collection::Orders, &id)?;
    tracing::info!(%id, deleted = result.deleted_count, "order delete");
    Ok(Json(result))
}

async fn confirm_order_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UpdateResult>> {
    let id = parse_id(&id)?;
    let mut fields = Document::new();
    fields.insert("status".to_string(), Value::String("confirmed".to_string()));
    Ok(Json(state.storage.update_by_id(Collection::Orders, &id, &fields)?))
}
