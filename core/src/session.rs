//! The session facade: one async method per remote operation.
//!
//! # Design
//! A `Session` is a cheap, clonable handle over shared state: the immutable
//! `Config`, the `TokenStore`, the `RequestExecutor`, and the cancellation
//! token that `destroy` trips. Every remote method has the same body: build
//! `RequestParts` from typed arguments, call `execute` with the matching
//! descriptor and decoder, return the `Outcome`. Only `login` and `logout`
//! add bookkeeping.
//!
//! Calls are independent. Two calls issued back to back may complete in
//! either order.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, TokenStorage};
use crate::endpoint;
use crate::error::{ApiError, ConfigError, Outcome};
use crate::executor::{decode, parse_base_url, RequestExecutor, RequestParts};
use crate::query::{OrderFilter, ProductFilter, TransactionFilter};
use crate::token_store::{FileStore, KeyValueStore, MemoryStore, TokenStore};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    Address, Category, CreateAddress, CreateOrder, CreateProduct, HealthResponse, LoginRequest, LoginResponse,
    Order, Product, RegisterRequest, StockInfo, Transaction, UpdateProduct, UpdateUser, User, Wallet,
};

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    tokens: Arc<TokenStore>,
    executor: RequestExecutor,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.inner.config.base_url)
            .field("tokens", &self.inner.tokens)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Session {
    /// Build a session with the reqwest transport and the configured storage.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(&config)?;
        let store: Box<dyn KeyValueStore> = match &config.storage {
            TokenStorage::Memory => Box::new(MemoryStore::new()),
            TokenStorage::File { dir: Some(dir), namespace } => Box::new(FileStore::open(dir, namespace)?),
            TokenStorage::File { dir: None, namespace } => Box::new(FileStore::open_default(namespace)?),
        };
        Self::with_parts(config, Arc::new(transport), TokenStore::new(store))
    }

    /// Build a session over a caller-supplied transport and token store.
    /// `config.storage` is ignored.
    pub fn with_parts(config: Config, transport: Arc<dyn Transport>, tokens: TokenStore) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&config.base_url)?;
        if config.api_key.is_some() {
            debug!("api_key is configured but is not attached to requests");
        }
        let tokens = Arc::new(tokens);
        let cancel = CancellationToken::new();
        let executor = RequestExecutor::new(base_url, transport, Arc::clone(&tokens), cancel.clone(), config.debug);
        info!(base_url = %config.base_url, timeout_seconds = config.timeout_seconds, "shop session created");
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                tokens,
                executor,
                cancel,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Whether both handles refer to the same session.
    pub fn ptr_eq(a: &Session, b: &Session) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Local check only; says nothing about token validity.
    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.is_authenticated()
    }

    pub fn stored_token(&self) -> Option<String> {
        self.inner.tokens.get()
    }

    /// Forget the stored token without contacting the server.
    pub fn clear_token(&self) -> Result<(), ApiError> {
        self.inner.tokens.clear().map_err(|e| ApiError::Storage(e.to_string()))
    }

    /// Cancel outstanding calls. Calls still waiting on the network resolve
    /// to `ApiError::Cancelled`, as does every call made afterwards.
    pub fn destroy(&self) {
        if !self.inner.cancel.is_cancelled() {
            info!(base_url = %self.inner.config.base_url, "shop session destroyed");
        }
        self.inner.cancel.cancel();
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Authenticate and persist the returned token.
    pub async fn login(&self, email: &str, password: &str) -> Outcome<LoginResponse> {
        let parts = RequestParts::new().json_body(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        let response = self
            .inner
            .executor
            .execute(&endpoint::LOGIN, parts, decode::json::<LoginResponse>)
            .await?;
        self.inner
            .tokens
            .save(&response.token)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        info!(user_id = %response.user.id, "logged in");
        Ok(response)
    }

    pub async fn register(&self, input: &RegisterRequest) -> Outcome<User> {
        let parts = RequestParts::new().json_body(input)?;
        self.inner.executor.execute(&endpoint::REGISTER, parts, decode::json).await
    }

    /// Sign out. The local token is cleared whatever the server says, even if
    /// the call fails, is cancelled, or the returned future is dropped.
    pub async fn logout(&self) -> Outcome<()> {
        let _clear = ClearOnDrop(&*self.inner.tokens);
        let outcome = self
            .inner
            .executor
            .execute(&endpoint::LOGOUT, RequestParts::new(), decode::ignore)
            .await;
        match &outcome {
            Ok(()) => info!("logged out"),
            Err(e) => info!(error = %e, "logged out locally; remote logout failed"),
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // User
    // -----------------------------------------------------------------------

    pub async fn get_current_user(&self) -> Outcome<User> {
        self.inner
            .executor
            .execute(&endpoint::GET_CURRENT_USER, RequestParts::new(), decode::json)
            .await
    }

    pub async fn update_user(&self, input: &UpdateUser) -> Outcome<User> {
        let parts = RequestParts::new().json_body(input)?;
        self.inner.executor.execute(&endpoint::UPDATE_USER, parts, decode::json).await
    }

    pub async fn get_addresses(&self) -> Outcome<Vec<Address>> {
        self.inner
            .executor
            .execute(&endpoint::GET_ADDRESSES, RequestParts::new(), decode::json)
            .await
    }

    pub async fn create_address(&self, input: &CreateAddress) -> Outcome<Address> {
        let parts = RequestParts::new().json_body(input)?;
        self.inner.executor.execute(&endpoint::CREATE_ADDRESS, parts, decode::json).await
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// List products. `None` and an empty filter send the same request.
    pub async fn get_products(&self, filter: Option<&ProductFilter>) -> Outcome<Vec<Product>> {
        let parts = RequestParts::new().query(filter)?;
        self.inner.executor.execute(&endpoint::GET_PRODUCTS, parts, decode::json).await
    }

    pub async fn get_product(&self, id: &str) -> Outcome<Product> {
        let parts = RequestParts::new().path("id", id);
        self.inner.executor.execute(&endpoint::GET_PRODUCT, parts, decode::json).await
    }

    pub async fn create_product(&self, input: &CreateProduct) -> Outcome<Product> {
        let parts = RequestParts::new().json_body(input)?;
        self.inner.executor.execute(&endpoint::CREATE_PRODUCT, parts, decode::json).await
    }

    pub async fn update_product(&self, id: &str, input: &UpdateProduct) -> Outcome<Product> {
        let parts = RequestParts::new().path("id", id).json_body(input)?;
        self.inner.executor.execute(&endpoint::UPDATE_PRODUCT, parts, decode::json).await
    }

    pub async fn delete_product(&self, id: &str) -> Outcome<()> {
        let parts = RequestParts::new().path("id", id);
        self.inner
            .executor
            .execute(&endpoint::DELETE_PRODUCT, parts, decode::ignore)
            .await
    }

    pub async fn get_categories(&self) -> Outcome<Vec<Category>> {
        self.inner
            .executor
            .execute(&endpoint::GET_CATEGORIES, RequestParts::new(), decode::json)
            .await
    }

    pub async fn get_stock(&self, product_id: &str) -> Outcome<StockInfo> {
        let parts = RequestParts::new().path("productId", product_id);
        self.inner.executor.execute(&endpoint::GET_STOCK, parts, decode::json).await
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub async fn get_orders(&self, filter: Option<&OrderFilter>) -> Outcome<Vec<Order>> {
        let parts = RequestParts::new().query(filter)?;
        self.inner.executor.execute(&endpoint::GET_ORDERS, parts, decode::json).await
    }

    pub async fn get_order(&self, id: &str) -> Outcome<Order> {
        let parts = RequestParts::new().path("id", id);
        self.inner.executor.execute(&endpoint::GET_ORDER, parts, decode::json).await
    }

    pub async fn create_order(&self, input: &CreateOrder) -> Outcome<Order> {
        let parts = RequestParts::new().json_body(input)?;
        self.inner.executor.execute(&endpoint::CREATE_ORDER, parts, decode::json).await
    }

    // -----------------------------------------------------------------------
    // Wallet
    // -----------------------------------------------------------------------

    pub async fn get_wallet(&self) -> Outcome<Wallet> {
        self.inner
            .executor
            .execute(&endpoint::GET_WALLET, RequestParts::new(), decode::json)
            .await
    }

    pub async fn get_transactions(&self, filter: Option<&TransactionFilter>) -> Outcome<Vec<Transaction>> {
        let parts = RequestParts::new().query(filter)?;
        self.inner
            .executor
            .execute(&endpoint::GET_TRANSACTIONS, parts, decode::json)
            .await
    }

    // -----------------------------------------------------------------------
    // Misc
    // -----------------------------------------------------------------------

    pub async fn health_check(&self) -> Outcome<HealthResponse> {
        self.inner
            .executor
            .execute(&endpoint::HEALTH_CHECK, RequestParts::new(), decode::json)
            .await
    }
}

/// Clears the token when dropped, so `logout` clears locally on every exit path.
struct ClearOnDrop<'a>(&'a TokenStore);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear_best_effort();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::executor::testing::{ScriptedTransport, StalledTransport};

    const LOGIN_BODY: &str =
        r#"{"token":"tok-123","user":{"id":"u1","email":"a@b.com","name":"Ada"},"expiresAt":"2030-01-01T00:00:00Z"}"#;

    fn session(transport: Arc<dyn Transport>) -> Session {
        Session::with_parts(Config::new("http://localhost:3000/"), transport, TokenStore::in_memory()).unwrap()
    }

    #[tokio::test]
    async fn login_persists_token_and_attaches_it() {
        let transport = ScriptedTransport::new();
        transport.push(200, "OK", LOGIN_BODY);
        transport.push(200, "OK", r#"{"data":{"id":"u1","email":"a@b.com","name":"Ada"},"status":200}"#);
        let s = session(transport.clone());
        assert!(!s.is_authenticated());

        let login = s.login("a@b.com", "pw").await.unwrap();
        assert_eq!(login.token, "tok-123");
        assert!(s.is_authenticated());
        assert_eq!(s.stored_token().as_deref(), Some("tok-123"));

        let sent_login = transport.last().unwrap();
        let body: serde_json::Value = serde_json::from_str(sent_login.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"email": "a@b.com", "password": "pw"}));
        assert_eq!(sent_login.header("authorization"), None);

        let me = s.get_current_user().await.unwrap();
        assert_eq!(me.id, "u1");
        assert_eq!(
            transport.last().unwrap().header("authorization"),
            Some("Bearer tok-123")
        );
    }

    #[tokio::test]
    async fn failed_login_leaves_store_untouched() {
        let transport = ScriptedTransport::new();
        transport.push(401, "Unauthorized", "");
        let s = session(transport);
        let err = s.login("a@b.com", "wrong").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(!s.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_token_even_when_remote_fails() {
        let transport = ScriptedTransport::new();
        transport.push(200, "OK", LOGIN_BODY);
        transport.push(500, "Internal Server Error", "boom");
        let s = session(transport.clone());
        s.login("a@b.com", "pw").await.unwrap();

        let err = s.logout().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!s.is_authenticated());
        assert_eq!(
            transport.last().unwrap().header("authorization"),
            Some("Bearer tok-123")
        );
    }

    #[tokio::test]
    async fn logout_clears_token_on_transport_failure() {
        let transport = ScriptedTransport::new();
        transport.push(200, "OK", LOGIN_BODY);
        transport.push_error(ApiError::Transport("connection reset".to_string()));
        let s = session(transport);
        s.login("a@b.com", "pw").await.unwrap();
        assert!(matches!(s.logout().await, Err(ApiError::Transport(_))));
        assert!(!s.is_authenticated());
    }

    #[tokio::test]
    async fn get_product_not_found() {
        let transport = ScriptedTransport::new();
        transport.push(404, "Not Found", "");
        let s = session(transport.clone());
        let err = s.get_product("missing").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Protocol {
                status: 404,
                message: "Not Found".to_string()
            }
        );
        assert_eq!(transport.last().unwrap().url, "http://localhost:3000/products/missing");
    }

    #[tokio::test]
    async fn get_products_with_and_without_empty_filter_match() {
        let transport = ScriptedTransport::new();
        transport.push(200, "OK", r#"{"data":[]}"#);
        transport.push(200, "OK", r#"{"data":[]}"#);
        let s = session(transport.clone());

        assert!(s.get_products(None).await.unwrap().is_empty());
        assert!(s.get_products(Some(&ProductFilter::default())).await.unwrap().is_empty());

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn get_orders_sends_status_filter() {
        let transport = ScriptedTransport::new();
        transport.push(200, "OK", r#"{"data":[]}"#);
        let s = session(transport.clone());
        let filter = OrderFilter {
            status: vec!["paid".to_string()],
        };
        s.get_orders(Some(&filter)).await.unwrap();
        assert_eq!(transport.last().unwrap().url, "http://localhost:3000/orders?status=paid");
    }

    #[tokio::test]
    async fn delete_product_returns_unit() {
        let transport = ScriptedTransport::new();
        transport.push(204, "No Content", "");
        let s = session(transport.clone());
        s.delete_product("p1").await.unwrap();
        let req = transport.last().unwrap();
        assert_eq!(req.method, crate::http::HttpMethod::Delete);
        assert_eq!(req.url, "http://localhost:3000/products/p1");
    }

    #[tokio::test]
    async fn destroy_cancels_pending_and_future_calls() {
        let s = session(Arc::new(StalledTransport));
        let pending = tokio::spawn({
            let s = s.clone();
            async move { s.get_wallet().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        s.destroy();
        assert!(s.is_destroyed());

        let result = tokio::time::timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
        assert_eq!(result.unwrap_err(), ApiError::Cancelled);
        assert_eq!(s.health_check().await.unwrap_err(), ApiError::Cancelled);
    }

    #[tokio::test]
    async fn logout_after_destroy_still_clears_locally() {
        let transport = ScriptedTransport::new();
        transport.push(200, "OK", LOGIN_BODY);
        let s = session(transport);
        s.login("a@b.com", "pw").await.unwrap();
        s.destroy();
        assert_eq!(s.logout().await.unwrap_err(), ApiError::Cancelled);
        assert!(!s.is_authenticated());
    }

    #[tokio::test]
    async fn abandoned_logout_still_clears_locally() {
        let tokens = TokenStore::in_memory();
        tokens.save("tok-123").unwrap();
        let s = Session::with_parts(Config::new("http://localhost:3000/"), Arc::new(StalledTransport), tokens).unwrap();
        assert!(s.is_authenticated());

        let timed_out = tokio::time::timeout(Duration::from_millis(20), s.logout()).await;
        assert!(timed_out.is_err());
        assert!(!s.is_authenticated());
    }

    #[tokio::test]
    async fn dot_identifiers_are_rejected_before_sending() {
        let transport = ScriptedTransport::new();
        let s = session(transport.clone());
        for id in ["", ".", ".."] {
            assert!(matches!(s.delete_product(id).await, Err(ApiError::Request(_))), "{id:?}");
            assert!(matches!(s.get_stock(id).await, Err(ApiError::Request(_))), "{id:?}");
        }
        assert!(transport.last().is_none());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = Session::with_parts(
            Config::new("not a url"),
            ScriptedTransport::new(),
            TokenStore::in_memory(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn clones_share_state() {
        let s = session(ScriptedTransport::new());
        let other = s.clone();
        assert!(Session::ptr_eq(&s, &other));
        s.inner.tokens.save("t").unwrap();
        assert!(other.is_authenticated());
        other.clear_token().unwrap();
        assert!(!s.is_authenticated());
    }
}
