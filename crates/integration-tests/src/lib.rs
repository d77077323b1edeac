//! Integration tests for the Crafted Chapter storefront client.
//!
//! The tests run the client against [`ScriptedBackend`], an in-process
//! bookstore API on `127.0.0.1:0`. The backend keeps a running cart per
//! token, answers every cart mutation with the full cart, and records every
//! request so tests can assert on request counts and bearer propagation.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p crafted-chapter-integration-tests
//! ```

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{Json, Router};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use crafted_chapter_storefront::navigation::{MemoryNavigator, Navigator};
use crafted_chapter_storefront::notify::{Notifier, RecordingNotifier};
use crafted_chapter_storefront::storage::{KeyValueStore, MemoryStore};
use crafted_chapter_storefront::{ClientConfig, Storefront};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// One request as the backend saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    /// Path below `/api` (e.g. `/cart/b1`).
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    status: StatusCode,
    message: Option<String>,
}

#[derive(Default)]
struct BackendState {
    requests: Vec<RecordedRequest>,
    /// email -> (name, password)
    users: HashMap<String, (String, String)>,
    /// token -> email
    tokens: HashMap<String, String>,
    /// token -> running cart
    carts: HashMap<String, BTreeMap<String, i64>>,
    /// token -> placed orders
    orders: HashMap<String, Vec<Value>>,
    products: Vec<Value>,
    failures: HashMap<(Method, String), ScriptedFailure>,
    delays: HashMap<(Method, String), Duration>,
}

/// In-process bookstore API.
///
/// The server task is aborted when the backend is dropped.
pub struct ScriptedBackend {
    addr: SocketAddr,
    state: Arc<Mutex<BackendState>>,
    server: JoinHandle<()>,
}

impl Drop for ScriptedBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl ScriptedBackend {
    /// Start a backend with the default catalog and no accounts.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(BackendState {
            products: default_products(),
            ..Default::default()
        }));

        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind scripted backend");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL the client should use.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Never in practice; the URL is always valid.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_api_url(&self.api_url()).expect("valid backend url")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an account and return a token valid for it.
    pub fn add_user(&self, name: &str, email: &str, password: &str) -> String {
        let mut state = self.lock();
        state
            .users
            .insert(email.to_string(), (name.to_string(), password.to_string()));
        issue_token(&mut state, email)
    }

    /// Replace the server cart for `token`.
    pub fn set_cart(&self, token: &str, lines: &[(&str, i64)]) {
        self.lock().carts.insert(
            token.to_string(),
            lines.iter().map(|&(id, q)| (id.to_string(), q)).collect(),
        );
    }

    /// The server cart for `token`.
    #[must_use]
    pub fn cart(&self, token: &str) -> BTreeMap<String, i64> {
        self.lock().carts.get(token).cloned().unwrap_or_default()
    }

    /// Replace the catalog.
    pub fn set_products(&self, products: Vec<Value>) {
        self.lock().products = products;
    }

    /// Answer `method path` with `status` (and an optional `{message}`)
    /// until [`recover`](Self::recover) is called.
    pub fn fail(&self, method: Method, path: &str, status: StatusCode, message: Option<&str>) {
        self.lock().failures.insert(
            (method, path.to_string()),
            ScriptedFailure {
                status,
                message: message.map(str::to_string),
            },
        );
    }

    pub fn recover(&self, method: Method, path: &str) {
        self.lock().failures.remove(&(method, path.to_string()));
    }

    /// Hold every `method path` response for `delay`.
    pub fn delay(&self, method: Method, path: &str, delay: Duration) {
        self.lock().delays.insert((method, path.to_string()), delay);
    }

    /// Every request so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests for `method path`.
    #[must_use]
    pub fn count(&self, method: &Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }
}

fn issue_token(state: &mut BackendState, email: &str) -> String {
    let token = format!("token-{email}-{}", state.tokens.len() + 1);
    state.tokens.insert(token.clone(), email.to_string());
    token
}

fn default_products() -> Vec<Value> {
    vec![
        json!({"_id": "b1", "title": "Dune", "author": "Frank Herbert", "price": 499,
               "description": "Spice", "coverImage": "https://img.example.com/dune.jpg",
               "genres": ["Sci-Fi", "Classic"]}),
        json!({"id": "b2", "title": "Emma", "author": "Jane Austen", "price": 250,
               "description": "Matchmaking", "coverImage": "https://img.example.com/emma.jpg",
               "genres": ["Romance"]}),
        json!({"_id": "b3", "title": "The Hobbit", "author": "J.R.R. Tolkien", "price": 399.5,
               "description": "There and back again", "coverImage": "https://img.example.com/hobbit.jpg",
               "genres": ["Fantasy"]}),
    ]
}

// =============================================================================
// Request handling
// =============================================================================

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Cart body with alternating product reference shapes.
fn cart_body(cart: &BTreeMap<String, i64>) -> Value {
    let items: Vec<Value> = cart
        .iter()
        .enumerate()
        .map(|(i, (id, quantity))| {
            let product = if i % 2 == 0 {
                json!({ "_id": id })
            } else {
                json!(id)
            };
            json!({ "product": product, "quantity": quantity })
        })
        .collect();
    json!({ "items": items })
}

fn price_of(products: &[Value], id: &str) -> f64 {
    products
        .iter()
        .find(|p| p.get("id").or_else(|| p.get("_id")).and_then(Value::as_str) == Some(id))
        .and_then(|p| p.get("price"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

async fn handle(
    State(state): State<Arc<Mutex<BackendState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(uri.path())
        .to_string();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let delay = {
        let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);
        s.requests.push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            authorization: authorization.clone(),
        });
        s.delays.get(&(method.clone(), path.clone())).copied()
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut s = state.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(failure) = s.failures.get(&(method.clone(), path.clone())) {
        return match &failure.message {
            Some(message) => error(failure.status, message),
            None => failure.status.into_response(),
        };
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method.clone(), segments.as_slice()) {
        (Method::GET, ["products"]) => Json(Value::Array(s.products.clone())).into_response(),
        (Method::POST, ["auth", "login"]) => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            let valid = s.users.get(email).is_some_and(|(_, expected)| expected == password);
            if !valid {
                return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
            }
            let token = issue_token(&mut s, email);
            Json(json!({ "token": token })).into_response()
        }
        (Method::POST, ["auth", "register"]) => {
            let name = body["name"].as_str().unwrap_or_default().to_string();
            let email = body["email"].as_str().unwrap_or_default().to_string();
            let password = body["password"].as_str().unwrap_or_default().to_string();
            if s.users.contains_key(&email) {
                return error(StatusCode::BAD_REQUEST, "User already exists");
            }
            s.users.insert(email.clone(), (name, password));
            let token = issue_token(&mut s, &email);
            (StatusCode::CREATED, Json(json!({ "token": token }))).into_response()
        }
        _ => {
            let Some(token) = authorization
                .as_deref()
                .and_then(|a| a.strip_prefix("Bearer "))
                .filter(|t| s.tokens.contains_key(*t))
                .map(str::to_string)
            else {
                return error(StatusCode::UNAUTHORIZED, "Not authorized, token failed");
            };
            authed(&mut s, &method, &segments, &body, &token)
        }
    }
}

fn authed(
    s: &mut BackendState,
    method: &Method,
    segments: &[&str],
    body: &Value,
    token: &str,
) -> Response {
    match (method, segments) {
        (&Method::GET, ["auth", "profile"]) => {
            let email = s.tokens.get(token).cloned().unwrap_or_default();
            let name = s.users.get(&email).map(|(n, _)| n.clone()).unwrap_or_default();
            Json(json!({
                "name": name, "email": email, "role": "user",
                "createdAt": "2024-03-01T10:00:00Z"
            }))
            .into_response()
        }
        (&Method::GET, ["cart"]) => Json(cart_body(&s.carts.get(token).cloned().unwrap_or_default())).into_response(),
        (&Method::POST, ["cart"]) => {
            let Some(id) = body["productId"].as_str() else {
                return error(StatusCode::BAD_REQUEST, "productId is required");
            };
            let quantity = body["quantity"].as_i64().unwrap_or(1);
            let cart = s.carts.entry(token.to_string()).or_default();
            *cart.entry(id.to_string()).or_default() += quantity;
            Json(cart_body(cart)).into_response()
        }
        (&Method::POST, ["cart", "clear"]) => {
            s.carts.remove(token);
            Json(json!({ "message": "Cart cleared" })).into_response()
        }
        (&Method::DELETE, ["cart", id]) => {
            let cart = s.carts.entry(token.to_string()).or_default();
            let Some(quantity) = cart.get_mut(*id) else {
                return error(StatusCode::NOT_FOUND, "Item not in cart");
            };
            *quantity -= 1;
            if *quantity <= 0 {
                cart.remove(*id);
            }
            Json(cart_body(cart)).into_response()
        }
        (&Method::POST, ["orders"]) => {
            let cart = s.carts.remove(token).unwrap_or_default();
            if cart.is_empty() {
                return error(StatusCode::BAD_REQUEST, "Cart is empty");
            }
            let items: Vec<Value> = cart
                .iter()
                .map(|(id, q)| json!({ "product": { "_id": id }, "quantity": q, "price": price_of(&s.products, id) }))
                .collect();
            let total: f64 = cart
                .iter()
                .map(|(id, q)| price_of(&s.products, id) * *q as f64)
                .sum();
            let orders = s.orders.entry(token.to_string()).or_default();
            let order = json!({
                "_id": format!("o{}", orders.len() + 1),
                "items": items,
                "totalAmount": total,
                "shippingAddress": body["shippingAddress"],
                "status": "pending",
                "createdAt": "2024-05-02T08:30:00Z",
            });
            orders.push(order.clone());
            (StatusCode::CREATED, Json(order)).into_response()
        }
        (&Method::GET, ["orders"]) => {
            Json(Value::Array(s.orders.get(token).cloned().unwrap_or_default())).into_response()
        }
        (&Method::GET, ["orders", id]) => s
            .orders
            .get(token)
            .and_then(|orders| orders.iter().find(|o| o["_id"] == *id).cloned())
            .map_or_else(|| error(StatusCode::NOT_FOUND, "Order not found"), |o| Json(o).into_response()),
        _ => error(StatusCode::NOT_FOUND, "Not found"),
    }
}

// =============================================================================
// Client harness
// =============================================================================

/// A storefront wired to a backend with in-memory collaborators.
pub struct Client {
    pub storefront: Storefront,
    pub store: Arc<dyn KeyValueStore>,
    pub navigator: Arc<MemoryNavigator>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Client {
    /// Build a client at `path` over `store`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn with_store(backend: &ScriptedBackend, path: &str, store: Arc<dyn KeyValueStore>) -> Self {
        let navigator = Arc::new(MemoryNavigator::new(path));
        let notifier = Arc::new(RecordingNotifier::new());
        let storefront = Storefront::new(
            backend.config(),
            Arc::clone(&store),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        )
        .expect("build storefront");
        Self {
            storefront,
            store,
            navigator,
            notifier,
        }
    }

    /// Build a client at `path` with an empty in-memory store.
    #[must_use]
    pub fn new(backend: &ScriptedBackend, path: &str) -> Self {
        Self::with_store(backend, path, Arc::new(MemoryStore::new()))
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
