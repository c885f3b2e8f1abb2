use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use super::domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, UserId, UserType,
    ValidationError,
};
use super::notify::Notifier;
use super::repository::HouseRepository;
use super::service::{HouseService, ServiceError};
use crate::auth::{moderator_auth, user_auth, AuthenticatedUser, TokenError, TokenIssuer};

/// Identity handed out by `/dummyLogin`.
pub const DUMMY_USER_ID: UserId = UserId(Uuid::from_u128(0x123e4567_e89b_12d3_a456_426614174000));

/// Shared handler state: the service plus the issuer used to mint tokens.
pub struct HousingState<R, N> {
    pub service: Arc<HouseService<R, N>>,
    pub tokens: Arc<TokenIssuer>,
}

impl<R, N> Clone for HousingState<R, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

/// Router builder exposing the public, user and moderator endpoints.
pub fn housing_router<R, N>(service: Arc<HouseService<R, N>>, tokens: Arc<TokenIssuer>) -> Router
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let moderator_routes = Router::new()
        .route("/house/create", post(create_house_handler::<R, N>))
        .route("/flat/update", post(update_flat_handler::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&tokens),
            moderator_auth,
        ));

    let user_routes = Router::new()
        .route("/house/:id", get(list_flats_handler::<R, N>))
        .route("/house/:id/subscribe", post(subscribe_handler::<R, N>))
        .route("/flat/create", post(create_flat_handler::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&tokens),
            user_auth,
        ));

    Router::new()
        .route("/dummyLogin", get(dummy_login_handler::<R, N>))
        .route("/login", post(login_handler::<R, N>))
        .route("/register", post(register_handler::<R, N>))
        .merge(moderator_routes)
        .merge(user_routes)
        .with_state(HousingState { service, tokens })
}

/// Boundary error: maps lower-layer failures to a status and a fixed message.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    BadRequest(&'static str),
    WrongPassword,
    ClaimedByAnotherModerator,
    Token(TokenError),
    Service {
        action: &'static str,
        source: ServiceError,
    },
}

impl ApiError {
    fn service(action: &'static str) -> impl FnOnce(ServiceError) -> Self {
        move |source| Self::Service { action, source }
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<TokenError> for ApiError {
    fn from(value: TokenError) -> Self {
        Self::Token(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            ApiError::WrongPassword => (StatusCode::FORBIDDEN, "wrong password".to_string()),
            ApiError::ClaimedByAnotherModerator => (
                StatusCode::FORBIDDEN,
                "flat is already being moderated by someone else".to_string(),
            ),
            ApiError::Token(err) => {
                error!(error = %err, "issuing token");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to issue token".to_string(),
                )
            }
            ApiError::Service { action, source } => {
                error!(error = %source, "failed to {action}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to {action}"),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| ApiError::BadRequest("invalid request body"))
}

fn house_id(path: Result<Path<HouseId>, PathRejection>) -> Result<HouseId, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("invalid house id"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct DummyLoginParams {
    #[serde(default)]
    user_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    id: Uuid,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    email: String,
    password: String,
    user_type: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateHouseRequest {
    address: String,
    year: i32,
    developer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateFlatRequest {
    house_id: HouseId,
    price: i64,
    rooms: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateFlatRequest {
    flat_id: FlatId,
    status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubscribeRequest {
    email: String,
}

pub(crate) async fn dummy_login_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    Query(params): Query<DummyLoginParams>,
) -> Result<String, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let user_type = UserType::parse_known(&params.user_type)?;
    Ok(state.tokens.issue(user_type, DUMMY_USER_ID)?)
}

pub(crate) async fn login_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<String, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let LoginRequest { id, password } = body(payload)?;
    let user_id = UserId(id);

    let user_type = state
        .service
        .authenticate(user_id, &password)
        .await
        .map_err(ApiError::service("check password"))?
        .ok_or(ApiError::WrongPassword)?;

    Ok(state.tokens.issue(user_type, user_id)?)
}

pub(crate) async fn register_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let RegisterRequest {
        email,
        password,
        user_type,
    } = body(payload)?;
    let user_type = UserType::parse_known(&user_type)?;

    let user_id = state
        .service
        .register_user(&email, &password, user_type)
        .await
        .map_err(ApiError::service("create user"))?;

    Ok(Json(json!({ "user_id": user_id })))
}

pub(crate) async fn create_house_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    payload: Result<Json<CreateHouseRequest>, JsonRejection>,
) -> Result<Json<House>, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let CreateHouseRequest {
        address,
        year,
        developer,
    } = body(payload)?;
    let house = NewHouse::new(address, developer, year)?;

    let house = state
        .service
        .create_house(house)
        .await
        .map_err(ApiError::service("create house"))?;
    Ok(Json(house))
}

pub(crate) async fn list_flats_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    path: Result<Path<HouseId>, PathRejection>,
) -> Result<Json<Vec<Flat>>, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let house_id = house_id(path)?;
    let flats = state
        .service
        .list_flats(house_id)
        .await
        .map_err(ApiError::service("list flats"))?;
    Ok(Json(flats))
}

pub(crate) async fn create_flat_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    payload: Result<Json<CreateFlatRequest>, JsonRejection>,
) -> Result<Json<Flat>, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let CreateFlatRequest {
        house_id,
        price,
        rooms,
    } = body(payload)?;
    let flat = NewFlat::new(house_id, price, rooms)?;

    let flat = state
        .service
        .create_flat(flat)
        .await
        .map_err(ApiError::service("create flat"))?;
    Ok(Json(flat))
}

pub(crate) async fn update_flat_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateFlatRequest>, JsonRejection>,
) -> Result<Json<Flat>, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let UpdateFlatRequest { flat_id, status } = body(payload)?;
    let status: FlatStatus = FlatStatus::parse_update_target(&status)?;

    let eligible = state
        .service
        .check_flat_moderator(flat_id, caller.user_id)
        .await
        .map_err(ApiError::service("check flat moderator"))?;
    if !eligible {
        return Err(ApiError::ClaimedByAnotherModerator);
    }

    let flat = state
        .service
        .update_flat_status(flat_id, status, caller.user_id)
        .await
        .map_err(ApiError::service("update flat"))?;
    Ok(Json(flat))
}

pub(crate) async fn subscribe_handler<R, N>(
    State(state): State<HousingState<R, N>>,
    path: Result<Path<HouseId>, PathRejection>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<&'static str, ApiError>
where
    R: HouseRepository + 'static,
    N: Notifier,
{
    let house_id = house_id(path)?;
    let SubscribeRequest { email } = body(payload)?;

    state
        .service
        .subscribe(house_id, &email)
        .await
        .map_err(ApiError::service("subscribe to new flats"))?;
    Ok("subscribed to new flats")
}
