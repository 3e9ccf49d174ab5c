//! Server crate provides HTTP server functionality.
//!
//! This module implements the storefront's HTTP surface: catalog browsing,
//! session-cart mutation, checkout, account endpoints, and the assistant
//! chat proxy, plus health and Prometheus metrics endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use app_config::AppConfig;
use axum::{
    body::Body,
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use deadpool_postgres::Pool;
use model::{Banner, Category, CartView, ChatTurn, CheckoutRequest, Order, OrderItem, Product};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use repository::{
    BannersRepository, CategoriesRepository, OrdersRepository, PgBannersRepository,
    PgCategoriesRepository, PgOrdersRepository, PgProductsRepository, PgUsersRepository,
    ProductFilter, ProductsRepository, RepositoryError,
};
use serde::{Deserialize, Serialize};
use service::{
    AssistantConfig, AssistantService, AuthError, AuthService, CartOutcome, CartService,
    CheckoutError, CheckoutService, HttpGenerationClient, PgOrderWriter, RejectReason,
    ServiceError,
};
use session::CartStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Name of the session cookie carrying the visitor id.
pub const SESSION_COOKIE: &str = "sid";

/// Catalog listing size cap.
const CATALOG_LIMIT: i64 = 48;
/// Flash-sale strip size cap.
const FLASH_LIMIT: i64 = 20;
/// Related-products size cap on the product page.
const RELATED_LIMIT: i64 = 8;

/// Warning shown when the storage layer is not reachable on the read path.
const DB_WARNING: &str =
    "Cơ sở dữ liệu chưa được khởi tạo hoặc không truy cập được. Hãy chạy migrations rồi khởi động lại server.";

type Cart = CartService<PgProductsRepository>;
type Checkout = CheckoutService<PgProductsRepository, PgOrderWriter<PgOrdersRepository>>;
type Assistant =
    AssistantService<PgProductsRepository, PgCategoriesRepository, HttpGenerationClient>;
type Auth = AuthService<PgUsersRepository>;

/// Application state shared between request handlers.
#[derive(Clone)]
pub struct AppState {
    products: Arc<PgProductsRepository>,
    categories: Arc<PgCategoriesRepository>,
    banners: Arc<PgBannersRepository>,
    orders: Arc<PgOrdersRepository>,
    store: Arc<CartStore>,
    cart: Arc<Cart>,
    checkout: Arc<Checkout>,
    assistant: Arc<Assistant>,
    auth: Arc<Auth>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire repositories and services on top of the shared pool.
    pub fn build(pool: Pool, cfg: &AppConfig) -> Result<Self> {
        let products = Arc::new(PgProductsRepository::new(pool.clone()));
        let categories = Arc::new(PgCategoriesRepository::new(pool.clone()));
        let banners = Arc::new(PgBannersRepository::new(pool.clone()));
        let orders = Arc::new(PgOrdersRepository::new(pool.clone()));
        let users = Arc::new(PgUsersRepository::new(pool.clone()));
        let store = Arc::new(CartStore::new(cfg.session_ttl));

        let cart = Arc::new(CartService::new(products.clone(), store.clone()));
        let writer = PgOrderWriter::new(pool.clone(), PgOrdersRepository::new(pool));
        let checkout = Arc::new(CheckoutService::new(cart.clone(), writer));
        let client = HttpGenerationClient::new(AssistantConfig {
            api_url: cfg.assistant_api_url.clone(),
            api_key: cfg.assistant_api_key.clone(),
            model: cfg.assistant_model.clone(),
            timeout: cfg.assistant_timeout,
        })
        .context("Failed to build assistant HTTP client")?;
        let assistant = Arc::new(AssistantService::new(
            products.clone(),
            categories.clone(),
            client,
        ));
        let auth = Arc::new(AuthService::new(users));

        Ok(Self {
            products,
            categories,
            banners,
            orders,
            store,
            cart,
            checkout,
            assistant,
            auth,
            metrics: Arc::new(Metrics::new()),
        })
    }
}

/// Metrics collects and exposes HTTP server metrics.
pub struct Metrics {
    registry: Registry,
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,
    errors_total: CounterVec,
    network_traffic_bytes: CounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "endpoint", "status"],
        )
        .expect("Failed to create http_requests_total metric");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "endpoint"],
        )
        .expect("Failed to create http_request_duration_seconds metric");

        let errors_total = CounterVec::new(
            Opts::new("errors_total", "Total number of errors"),
            &["source", "endpoint"],
        )
        .expect("Failed to create errors_total metric");

        let network_traffic_bytes = CounterVec::new(
            Opts::new("network_traffic_bytes", "Network traffic in bytes"),
            &["direction"],
        )
        .expect("Failed to create network_traffic_bytes metric");

        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("Failed to register http_requests_total metric");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("Failed to register http_request_duration_seconds metric");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("Failed to register errors_total metric");
        registry
            .register(Box::new(network_traffic_bytes.clone()))
            .expect("Failed to register network_traffic_bytes metric");

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            errors_total,
            network_traffic_bytes,
        }
    }

    fn record_request(&self, method: &str, endpoint: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, endpoint])
            .observe(duration.as_secs_f64());
    }

    fn record_error(&self, source: &str, endpoint: &str) {
        self.errors_total
            .with_label_values(&[source, endpoint])
            .inc();
    }

    fn record_network_traffic(&self, direction: &str, bytes: usize) {
        self.network_traffic_bytes
            .with_label_values(&[direction])
            .inc_by(bytes as f64);
    }
}

/// Server represents the storefront HTTP server.
pub struct Server {
    state: AppState,
    port: String,
}

impl Server {
    /// Creates a new Server instance listening on `port`.
    pub fn new(port: String, state: AppState) -> Self {
        info!("Initializing HTTP server on port {}", port);
        Self { state, port }
    }

    /// Starts the server and blocks until it's shut down.
    pub async fn start(&self) -> Result<()> {
        let app = self.create_router();

        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .context("Failed to bind to port")?;

        info!("HTTP server listening on port {}", self.port);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("HTTP server shut down gracefully");
        Ok(())
    }

    fn create_router(&self) -> Router {
        let metrics = self.state.metrics.clone();

        Router::new()
            .route("/api/catalog", get(Self::handle_catalog))
            .route("/api/products/{id}", get(Self::handle_product))
            .route("/api/cart", get(Self::handle_cart_view))
            .route("/cart/add", post(Self::handle_cart_add))
            .route("/cart/update", post(Self::handle_cart_update))
            .route("/cart/remove", post(Self::handle_cart_remove))
            .route("/cart/clear", post(Self::handle_cart_clear))
            .route("/checkout", post(Self::handle_checkout))
            .route("/api/orders/{id}", get(Self::handle_order))
            .route("/api/register", post(Self::handle_register))
            .route("/api/login", post(Self::handle_login))
            .route("/api/logout", post(Self::handle_logout))
            .route("/api/chat", post(Self::handle_chat))
            .route("/health", get(Self::handle_health))
            .route("/metrics", get(Self::handle_metrics))
            .layer(axum::middleware::from_fn_with_state(
                metrics,
                Self::metrics_middleware,
            ))
            .with_state(self.state.clone())
    }

    /// Middleware for collecting metrics on HTTP requests.
    async fn metrics_middleware(
        State(metrics): State<Arc<Metrics>>,
        req: axum::extract::Request,
        next: axum::middleware::Next,
    ) -> Response {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        // Content-Length is an estimate of the traffic; streamed bodies
        // without the header are not counted.
        let request_size = content_length(req.headers());
        if request_size > 0 {
            metrics.record_network_traffic("in", request_size);
        }

        let start = std::time::Instant::now();
        let response = next.run(req).await;
        let duration = start.elapsed();

        let status = response.status().as_u16();
        metrics.record_request(&method, &path, status, duration);
        if status >= 400 {
            metrics.record_error("http", &path);
        }

        let response_size = content_length(response.headers());
        if response_size > 0 {
            metrics.record_network_traffic("out", response_size);
        }

        response
    }

    async fn handle_catalog(
        State(state): State<AppState>,
        Query(params): Query<CatalogQuery>,
    ) -> Response {
        let filter = ProductFilter {
            query: params.q.filter(|q| !q.trim().is_empty()),
            match_specification: false,
            category_slug: params.cat.filter(|c| !c.trim().is_empty()),
            limit: CATALOG_LIMIT,
        };
        let now = Utc::now();

        let listing = async {
            let products = state.products.search(&filter).await?;
            let categories = state.categories.all().await?;
            let banners = state.banners.active().await?;
            let flash_items = state.products.flash_items(now, FLASH_LIMIT).await?;
            Ok::<_, RepositoryError>((products, categories, banners, flash_items))
        }
        .await;

        match listing {
            Ok((products, categories, banners, flash_items)) => Json(CatalogResponse {
                products,
                categories,
                banners,
                flash_items,
                warning: None,
            })
            .into_response(),
            Err(e) => {
                // The landing page degrades instead of failing hard.
                error!("Catalog read failed: {}", e);
                state.metrics.record_error("db", "/api/catalog");
                Json(CatalogResponse {
                    products: Vec::new(),
                    categories: Vec::new(),
                    banners: Vec::new(),
                    flash_items: Vec::new(),
                    warning: Some(DB_WARNING.to_string()),
                })
                .into_response()
            }
        }
    }

    async fn handle_product(
        State(state): State<AppState>,
        AxumPath(id): AxumPath<i64>,
    ) -> Response {
        let product = match state.products.get(id).await {
            Ok(p) if p.is_active => p,
            Ok(_) | Err(RepositoryError::NotFound) => {
                return (StatusCode::NOT_FOUND, "product not found").into_response()
            }
            Err(e) => {
                error!("Product read failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response();
            }
        };

        let related = match product.category_id {
            Some(category_id) => state
                .products
                .related(category_id, product.id, RELATED_LIMIT)
                .await
                .unwrap_or_else(|e| {
                    warn!("Related products lookup failed: {}", e);
                    Vec::new()
                }),
            None => Vec::new(),
        };

        Json(ProductResponse { product, related }).into_response()
    }

    async fn handle_cart_view(State(state): State<AppState>, headers: HeaderMap) -> Response {
        let (sid, minted) = ensure_session(&headers);
        match state.cart.view(&sid).await {
            Ok(view) => {
                // view() already pruned stale entries, so the stored count
                // matches the rendered lines.
                let count = state.cart.item_count(&sid).await;
                with_session_cookie(
                    Json(CartResponse { view, count }).into_response(),
                    minted,
                )
            }
            Err(e) => {
                error!("Cart view failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
        }
    }

    async fn handle_cart_add(
        State(state): State<AppState>,
        headers: HeaderMap,
        Form(form): Form<CartForm>,
    ) -> Response {
        let (sid, minted) = ensure_session(&headers);
        let target = back_target(&headers);

        let Some(product_id) = form.product_id.as_deref().and_then(|s| s.parse().ok()) else {
            return with_session_cookie(redirect(&target, Some("not-found")), minted);
        };
        // Malformed quantity means "1"; the shopper still gets their item.
        let qty = parse_qty(form.qty.as_deref()).unwrap_or(1).max(1);

        match state.cart.add(&sid, product_id, qty).await {
            Ok(outcome) => {
                with_session_cookie(redirect(&target, Some(&outcome_code(&outcome))), minted)
            }
            Err(e) => {
                error!("Cart add failed: {}", e);
                with_session_cookie(redirect(&target, Some("error")), minted)
            }
        }
    }

    async fn handle_cart_update(
        State(state): State<AppState>,
        headers: HeaderMap,
        Form(form): Form<CartForm>,
    ) -> Response {
        let (sid, minted) = ensure_session(&headers);
        let target = back_target(&headers);

        let Some(product_id) = form.product_id.as_deref().and_then(|s| s.parse().ok()) else {
            return with_session_cookie(redirect(&target, Some("not-found")), minted);
        };
        let qty = parse_qty(form.qty.as_deref()).unwrap_or(1);

        match state.cart.set_quantity(&sid, product_id, qty).await {
            Ok(outcome) => {
                with_session_cookie(redirect(&target, Some(&outcome_code(&outcome))), minted)
            }
            Err(e) => {
                error!("Cart update failed: {}", e);
                with_session_cookie(redirect(&target, Some("error")), minted)
            }
        }
    }

    async fn handle_cart_remove(
        State(state): State<AppState>,
        headers: HeaderMap,
        Form(form): Form<CartForm>,
    ) -> Response {
        let (sid, minted) = ensure_session(&headers);
        let target = back_target(&headers);

        if let Some(product_id) = form.product_id.as_deref().and_then(|s| s.parse().ok()) {
            state.cart.remove(&sid, product_id).await;
        }
        with_session_cookie(redirect(&target, Some("removed")), minted)
    }

    async fn handle_cart_clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
        let (sid, minted) = ensure_session(&headers);
        state.cart.clear(&sid).await;
        with_session_cookie(redirect("/cart", Some("cleared")), minted)
    }

    async fn handle_checkout(
        State(state): State<AppState>,
        headers: HeaderMap,
        Form(form): Form<CheckoutRequest>,
    ) -> Response {
        let (sid, minted) = ensure_session(&headers);
        let user_id = state.store.user_id(&sid).await;

        match state.checkout.place_order(&sid, user_id, &form).await {
            Ok(placed) => {
                info!("Order placed: {} total {}", placed.id, placed.total);
                with_session_cookie(
                    redirect(&format!("/orders/{}/placed", placed.id), None),
                    minted,
                )
            }
            Err(CheckoutError::EmptyCart) => {
                with_session_cookie(redirect("/cart", Some("cart-empty")), minted)
            }
            Err(CheckoutError::Validation(errors)) => with_session_cookie(
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(serde_json::json!({ "errors": errors })),
                )
                    .into_response(),
                minted,
            ),
            Err(CheckoutError::Service(e)) => {
                error!("Checkout failed: {}", e);
                state.metrics.record_error("checkout", "/checkout");
                (StatusCode::INTERNAL_SERVER_ERROR, "checkout failed").into_response()
            }
        }
    }

    async fn handle_order(State(state): State<AppState>, AxumPath(id): AxumPath<Uuid>) -> Response {
        let order = match state.orders.get(id).await {
            Ok(order) => order,
            Err(RepositoryError::NotFound) => {
                return (StatusCode::NOT_FOUND, "order not found").into_response()
            }
            Err(e) => {
                error!("Order read failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response();
            }
        };
        let items = match state.orders.items_for(id).await {
            Ok(items) => items,
            Err(e) => {
                error!("Order items read failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response();
            }
        };
        Json(OrderResponse { order, items }).into_response()
    }

    async fn handle_register(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(body): Json<RegisterBody>,
    ) -> Response {
        let (sid, minted) = ensure_session(&headers);
        match state
            .auth
            .register(
                &body.username,
                &body.email,
                &body.password,
                &body.password_confirm,
            )
            .await
        {
            Ok(user) => {
                // Registration logs the new account in.
                state.store.set_user(&sid, Some(user.id)).await;
                with_session_cookie((StatusCode::CREATED, Json(user)).into_response(), minted)
            }
            Err(AuthError::Validation(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(serde_json::json!({ "errors": errors })),
            )
                .into_response(),
            Err(AuthError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, "invalid credentials").into_response()
            }
            Err(AuthError::Db(e)) => {
                error!("Registration failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
        }
    }

    async fn handle_login(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(body): Json<LoginBody>,
    ) -> Response {
        let (sid, minted) = ensure_session(&headers);
        match state.auth.login(&body.username, &body.password).await {
            Ok(user) => {
                state.store.set_user(&sid, Some(user.id)).await;
                with_session_cookie(Json(user).into_response(), minted)
            }
            Err(AuthError::InvalidCredentials) => {
                (StatusCode::UNAUTHORIZED, "invalid credentials").into_response()
            }
            Err(e) => {
                error!("Login failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failure").into_response()
            }
        }
    }

    async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
        if let Some(sid) = cookie_value(&headers, SESSION_COOKIE) {
            state.store.set_user(&sid, None).await;
        }
        StatusCode::NO_CONTENT.into_response()
    }

    async fn handle_chat(
        State(state): State<AppState>,
        headers: HeaderMap,
        Json(body): Json<ChatBody>,
    ) -> Response {
        // CSRF precondition: the session cookie must already be established.
        if cookie_value(&headers, SESSION_COOKIE).is_none() {
            return (StatusCode::FORBIDDEN, "session cookie required").into_response();
        }

        let history = body.history.unwrap_or_default();
        match state.assistant.answer(&body.message, &history).await {
            Ok(reply) => Json(ChatReply { reply }).into_response(),
            Err(ServiceError::InvalidInput(_)) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "message is required" })),
            )
                .into_response(),
            Err(e) => {
                error!("Assistant failed unexpectedly: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "assistant failure").into_response()
            }
        }
    }

    async fn handle_health() -> &'static str {
        "OK"
    }

    async fn handle_metrics(State(state): State<AppState>) -> Response {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&state.metrics.registry.gather(), &mut buffer) {
            error!("Failed to encode metrics: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
        }

        match String::from_utf8(buffer) {
            Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
            Err(e) => {
                error!("Failed to convert metrics to UTF-8: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Invalid metrics data").into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogQuery {
    q: Option<String>,
    cat: Option<String>,
}

#[derive(Debug, Serialize)]
struct CatalogResponse {
    products: Vec<Product>,
    categories: Vec<Category>,
    banners: Vec<Banner>,
    #[serde(rename = "flash_items")]
    flash_items: Vec<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProductResponse {
    product: Product,
    related: Vec<Product>,
}

#[derive(Debug, Serialize)]
struct CartResponse {
    #[serde(flatten)]
    view: CartView,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct CartForm {
    #[serde(rename = "product_id")]
    product_id: Option<String>,
    qty: Option<String>,
}

#[derive(Debug, Serialize)]
struct OrderResponse {
    order: Order,
    items: Vec<OrderItem>,
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    username: String,
    email: String,
    password: String,
    #[serde(rename = "password_confirm")]
    password_confirm: String,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: String,
    history: Option<Vec<ChatTurn>>,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    reply: String,
}

/// Declared body size in bytes, or 0 when the header is absent or malformed.
fn content_length(headers: &HeaderMap) -> usize {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Extract a cookie value from the request headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Current session id, minting a fresh one when the cookie is absent.
/// Returns the id and, when minted, the Set-Cookie header value to attach.
fn ensure_session(headers: &HeaderMap) -> (String, Option<String>) {
    match cookie_value(headers, SESSION_COOKIE) {
        Some(sid) if !sid.is_empty() => (sid, None),
        _ => {
            let sid = Uuid::new_v4().to_string();
            let cookie = format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax");
            (sid, Some(cookie))
        }
    }
}

/// Attach a freshly minted session cookie, if any, to the response.
fn with_session_cookie(mut response: Response, cookie: Option<String>) -> Response {
    if let Some(cookie) = cookie {
        if let Ok(value) = cookie.parse() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

/// Where a cart mutation sends the shopper afterwards: the referring page,
/// or the cart page as the default landing spot.
fn back_target(headers: &HeaderMap) -> String {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("/cart")
        .to_string()
}

/// 303 redirect, optionally tagged with a machine-readable notice code the
/// client renders as a localized message.
fn redirect(target: &str, notice: Option<&str>) -> Response {
    let location = match notice {
        Some(code) => {
            let sep = if target.contains('?') { '&' } else { '?' };
            format!("{target}{sep}notice={code}")
        }
        None => target.to_string(),
    };
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, location)
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Lenient quantity parsing for form input.
fn parse_qty(raw: Option<&str>) -> Option<u32> {
    raw?.trim().parse().ok()
}

/// Map a cart outcome to its notice code.
fn outcome_code(outcome: &CartOutcome) -> String {
    match outcome {
        CartOutcome::Added { .. } => "added".to_string(),
        CartOutcome::Updated { .. } => "updated".to_string(),
        CartOutcome::Capped { stored } => format!("capped-{stored}"),
        CartOutcome::Removed => "removed".to_string(),
        CartOutcome::Rejected(RejectReason::NotFound) => "not-found".to_string(),
        CartOutcome::Rejected(RejectReason::Inactive) => "inactive".to_string(),
        CartOutcome::Rejected(RejectReason::OutOfStock) => "out-of-stock".to_string(),
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("Failed to install signal handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
