use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::TokenIssuer;
use crate::housing::domain::{
    Flat, FlatId, FlatStatus, House, HouseId, NewFlat, NewHouse, User, UserId, UserType,
};
use crate::housing::memory::InMemoryHouseRepository;
use crate::housing::notify::{Notifier, NotifyError};
use crate::housing::repository::{HouseRepository, RepositoryError};
use crate::housing::router::housing_router;
use crate::housing::service::HouseService;

pub(super) const SECRET: &[u8] = b"test-secret";

pub(super) fn tokens() -> Arc<TokenIssuer> {
    Arc::new(TokenIssuer::new(SECRET))
}

pub(super) fn token_for(user_type: UserType, user_id: UserId) -> String {
    tokens().issue(user_type, user_id).expect("token issued")
}

pub(super) fn build_service() -> (
    HouseService<InMemoryHouseRepository, RecordingNotifier>,
    Arc<InMemoryHouseRepository>,
    Arc<RecordingNotifier>,
) {
    let repository = Arc::new(InMemoryHouseRepository::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = HouseService::new(repository.clone(), notifier.clone());
    (service, repository, notifier)
}

pub(super) fn build_router() -> (axum::Router, Arc<InMemoryHouseRepository>) {
    let (service, repository, _) = build_service();
    (housing_router(Arc::new(service), tokens()), repository)
}

pub(super) async fn seeded_house(repository: &InMemoryHouseRepository) -> House {
    repository
        .create_house(NewHouse::new("foo", "bar", 2021).expect("valid house"))
        .await
        .expect("house stored")
}

pub(super) async fn seeded_flat(repository: &InMemoryHouseRepository, house_id: HouseId) -> Flat {
    repository
        .create_flat(NewFlat::new(house_id, 1_000_000, 3).expect("valid flat"))
        .await
        .expect("flat stored")
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    /// Polls until `count` notifications arrived; the fan-out is detached.
    pub(super) async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

pub(super) struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, recipient: &str, _message: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Transport(format!("mailbox {recipient} offline")))
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

#[async_trait]
impl HouseRepository for UnavailableRepository {
    async fn create_user(
        &self,
        _id: UserId,
        _email: &str,
        _password_hash: &str,
        _user_type: UserType,
    ) -> Result<UserId, RepositoryError> {
        offline()
    }

    async fn fetch_user(&self, _id: UserId) -> Result<User, RepositoryError> {
        offline()
    }

    async fn create_house(&self, _house: NewHouse) -> Result<House, RepositoryError> {
        offline()
    }

    async fn list_flats(&self, _house_id: HouseId) -> Result<Vec<Flat>, RepositoryError> {
        offline()
    }

    async fn create_flat(&self, _flat: NewFlat) -> Result<Flat, RepositoryError> {
        offline()
    }

    async fn update_flat_status(
        &self,
        _flat_id: FlatId,
        _status: FlatStatus,
        _moderator: UserId,
    ) -> Result<Flat, RepositoryError> {
        offline()
    }

    async fn flat_moderator(&self, _flat_id: FlatId) -> Result<Option<UserId>, RepositoryError> {
        offline()
    }

    async fn subscribe(&self, _house_id: HouseId, _email: &str) -> Result<(), RepositoryError> {
        offline()
    }

    async fn subscribers(&self, _house_id: HouseId) -> Result<Vec<String>, RepositoryError> {
        offline()
    }
}

/// Delegates to memory storage but cannot list subscribers.
#[derive(Default)]
pub(super) struct SubscriberOutageRepository {
    pub(super) inner: InMemoryHouseRepository,
}

#[async_trait]
impl HouseRepository for SubscriberOutageRepository {
    async fn create_user(
        &self,
        id: UserId,
        email: &str,
        password_hash: &str,
        user_type: UserType,
    ) -> Result<UserId, RepositoryError> {
        self.inner
            .create_user(id, email, password_hash, user_type)
            .await
    }

    async fn fetch_user(&self, id: UserId) -> Result<User, RepositoryError> {
        self.inner.fetch_user(id).await
    }

    async fn create_house(&self, house: NewHouse) -> Result<House, RepositoryError> {
        self.inner.create_house(house).await
    }

    async fn list_flats(&self, house_id: HouseId) -> Result<Vec<Flat>, RepositoryError> {
        self.inner.list_flats(house_id).await
    }

    async fn create_flat(&self, flat: NewFlat) -> Result<Flat, RepositoryError> {
        self.inner.create_flat(flat).await
    }

    async fn update_flat_status(
        &self,
        flat_id: FlatId,
        status: FlatStatus,
        moderator: UserId,
    ) -> Result<Flat, RepositoryError> {
        self.inner
            .update_flat_status(flat_id, status, moderator)
            .await
    }

    async fn flat_moderator(&self, flat_id: FlatId) -> Result<Option<UserId>, RepositoryError> {
        self.inner.flat_moderator(flat_id).await
    }

    async fn subscribe(&self, house_id: HouseId, email: &str) -> Result<(), RepositoryError> {
        self.inner.subscribe(house_id, email).await
    }

    async fn subscribers(&self, _house_id: HouseId) -> Result<Vec<String>, RepositoryError> {
        offline()
    }
}

pub(super) async fn send(
    router: &axum::Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, token);
    }
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("json encodes"))
        }
        None => Body::empty(),
    };

    router
        .clone()
        .oneshot(request.body(body).expect("request builds"))
        .await
        .expect("route executes")
}

pub(super) async fn read_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body")
        .to_vec()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    serde_json::from_slice(&read_body(response).await).expect("json payload")
}
