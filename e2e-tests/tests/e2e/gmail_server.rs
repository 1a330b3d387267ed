//! Minimal Gmail REST stand-in served by axum on a random local port

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use phish_rs::provider::{MessagePage, MessageRef, ProviderMessage};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
pub struct MockGmail {
    messages: Vec<ProviderMessage>,
    access_token: Mutex<String>,
    /// 429 responses still to hand out before serving normally
    rate_limited: AtomicUsize,
    /// message ids answered with 500
    broken: Vec<String>,
    list_sizes: Mutex<Vec<usize>>,
    get_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
}

impl MockGmail {
    pub fn new(access_token: &str) -> Self {
        Self {
            access_token: Mutex::new(access_token.to_string()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: ProviderMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_rate_limit(self, responses: usize) -> Self {
        self.rate_limited.store(responses, Ordering::SeqCst);
        self
    }

    pub fn with_broken_message(mut self, id: &str) -> Self {
        self.broken.push(id.to_string());
        self
    }

    /// Invalidate the current token; the next request gets 401
    pub fn rotate_token(&self, token: &str) {
        *self.access_token.lock().unwrap() = token.to_string();
    }

    pub fn list_sizes(&self) -> Vec<usize> {
        self.list_sizes.lock().unwrap().clone()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn unauthorized(&self) -> usize {
        self.unauthorized.load(Ordering::SeqCst)
    }

    /// Serve on 127.0.0.1 and return the base URL
    pub async fn spawn(self: Arc<Self>) -> String {
        let app = Router::new()
            .route("/gmail/v1/users/:user/messages", get(list_messages))
            .route("/gmail/v1/users/:user/messages/:id", get(get_message))
            .route("/token", post(refresh_token))
            .with_state(self);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token.lock().unwrap());
        let ok = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v == expected);
        if !ok {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
        }
        ok
    }

    fn take_rate_limit(&self) -> bool {
        self.rate_limited
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": { "code": status.as_u16(), "message": message } }))).into_response()
}

fn too_many_requests() -> Response {
    let mut response = error(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded");
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, header::HeaderValue::from_static("0"));
    response
}

async fn list_messages(
    State(gmail): State<Arc<MockGmail>>,
    Path(_user): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    if !gmail.authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "invalid credentials");
    }
    if gmail.take_rate_limit() {
        return too_many_requests();
    }

    let mut labels = Vec::new();
    let mut max_results = 100usize;
    let mut offset = 0usize;
    for (key, value) in query {
        match key.as_str() {
            "labelIds" => labels.push(value),
            "maxResults" => max_results = value.parse().unwrap_or(100),
            "pageToken" => offset = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    gmail.list_sizes.lock().unwrap().push(max_results);

    let matching: Vec<&ProviderMessage> = gmail
        .messages
        .iter()
        .filter(|m| labels.is_empty() || m.label_ids.iter().any(|l| labels.contains(l)))
        .collect();
    let end = (offset + max_results).min(matching.len());
    let page = MessagePage {
        messages: matching[offset.min(end)..end]
            .iter()
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect(),
        next_page_token: (end < matching.len()).then(|| end.to_string()),
        result_size_estimate: Some(matching.len() as u64),
    };
    Json(page).into_response()
}

async fn get_message(
    State(gmail): State<Arc<MockGmail>>,
    Path((_user, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !gmail.authorized(&headers) {
        return error(StatusCode::UNAUTHORIZED, "invalid credentials");
    }
    if gmail.take_rate_limit() {
        return too_many_requests();
    }
    gmail.get_calls.fetch_add(1, Ordering::SeqCst);

    if query.get("format").map(String::as_str) != Some("full") {
        return error(StatusCode::BAD_REQUEST, "format=full expected");
    }
    if gmail.broken.contains(&id) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "backend error");
    }
    match gmail.messages.iter().find(|m| m.id == id) {
        Some(message) => Json(message.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn refresh_token(
    State(gmail): State<Arc<MockGmail>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let valid = form.get("grant_type").map(String::as_str) == Some("refresh_token")
        && form.get("refresh_token").map(String::as_str) == Some("refresh-1")
        && form.get("client_id").is_some()
        && form.get("client_secret").is_some();
    if !valid {
        return error(StatusCode::BAD_REQUEST, "invalid_grant");
    }

    let n = gmail.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("fresh-{}", n);
    gmail.rotate_token(&token);
    Json(json!({ "access_token": token, "expires_in": 3600, "token_type": "Bearer" })).into_response()
}
