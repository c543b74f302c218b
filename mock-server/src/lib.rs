use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const SEED_EMAIL: &str = "a@b.com";
pub const SEED_PASSWORD: &str = "pw";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    pub status: u16,
    pub message: Option<String>,
    pub timestamp: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
    pub expires_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub status: String,
    pub total: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockInfo {
    pub product_id: String,
    pub quantity: i64,
    pub reserved: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub balance: f64,
    pub currency: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub wallet_id: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category_id: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

#[derive(Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

struct Account {
    user: User,
    password: String,
}

/// In-memory state of the fake shop.
#[derive(Default)]
pub struct Store {
    accounts: HashMap<String, Account>,
    sessions: HashMap<String, String>,
    products: BTreeMap<String, Product>,
    categories: Vec<Category>,
    stock: HashMap<String, StockInfo>,
    orders: Vec<Order>,
    wallets: HashMap<String, Wallet>,
    transactions: Vec<Transaction>,
    addresses: HashMap<String, Vec<Address>>,
}

impl Store {
    /// One account (`SEED_EMAIL` / `SEED_PASSWORD`), three products, two
    /// categories and a funded wallet.
    pub fn seeded() -> Self {
        let mut store = Store::default();
        let user = User {
            id: "u1".to_string(),
            email: SEED_EMAIL.to_string(),
            name: "Ada".to_string(),
            phone: None,
        };
        store.accounts.insert(
            user.id.clone(),
            Account {
                user,
                password: SEED_PASSWORD.to_string(),
            },
        );
        store.categories = vec![
            Category {
                id: "c1".to_string(),
                name: "Drinks".to_string(),
            },
            Category {
                id: "c2".to_string(),
                name: "Kitchen".to_string(),
            },
        ];
        for (id, name, price, category, quantity) in [
            ("p1", "Tea", 3.5, "c1", 10),
            ("p2", "Coffee", 7.0, "c1", 0),
            ("p3", "Mug", 12.0, "c2", 5),
        ] {
            store.products.insert(
                id.to_string(),
                Product {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: format!("{name} from the seed catalog"),
                    price,
                    category_id: Some(category.to_string()),
                },
            );
            store.stock.insert(
                id.to_string(),
                StockInfo {
                    product_id: id.to_string(),
                    quantity,
                    reserved: 0,
                },
            );
        }
        store.wallets.insert(
            "u1".to_string(),
            Wallet {
                id: "w1".to_string(),
                user_id: "u1".to_string(),
                balance: 95.0,
                currency: "EUR".to_string(),
            },
        );
        store.transactions = vec![
            Transaction {
                id: "t1".to_string(),
                wallet_id: "w1".to_string(),
                amount: 100.0,
                kind: "credit".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
            },
            Transaction {
                id: "t2".to_string(),
                wallet_id: "w1".to_string(),
                amount: -5.0,
                kind: "debit".to_string(),
                created_at: "2024-02-01T00:00:00Z".to_string(),
            },
        ];
        store
    }

    fn user_for(&self, headers: &HeaderMap) -> Result<User, StatusCode> {
        let token = bearer(headers).ok_or(StatusCode::UNAUTHORIZED)?;
        let user_id = self.sessions.get(token).ok_or(StatusCode::UNAUTHORIZED)?;
        self.accounts
            .get(user_id)
            .map(|a| a.user.clone())
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

pub type Db = Arc<RwLock<Store>>;

type Enveloped<T> = Result<(StatusCode, Json<Envelope<T>>), StatusCode>;

fn envelope<T>(status: StatusCode, data: T) -> Enveloped<T> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string();
    Ok((
        status,
        Json(Envelope {
            data,
            status: status.as_u16(),
            message: None,
            timestamp,
        }),
    ))
}

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/user/me", get(current_user).put(update_user))
        .route("/user/addresses", get(list_addresses).post(create_address))
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories", get(list_categories))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/stock/{product_id}", get(get_stock))
        .route("/ewallet", get(get_wallet))
        .route("/ewallet/transactions", get(list_transactions))
        .route("/health", get(health))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let mut store = db.write().await;
    let user = store
        .accounts
        .values()
        .find(|a| a.user.email == input.email && a.password == input.password)
        .map(|a| a.user.clone())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let token = Uuid::new_v4().to_string();
    store.sessions.insert(token.clone(), user.id.clone());
    debug!(user_id = %user.id, "issued token");
    Ok(Json(LoginResponse {
        token,
        user,
        expires_at: "2099-01-01T00:00:00Z".to_string(),
    }))
}

async fn register(State(db): State<Db>, Json(input): Json<RegisterRequest>) -> Enveloped<User> {
    let mut store = db.write().await;
    if store.accounts.values().any(|a| a.user.email == input.email) {
        return Err(StatusCode::CONFLICT);
    }
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        name: input.name,
        phone: input.phone,
    };
    store.accounts.insert(
        user.id.clone(),
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    envelope(StatusCode::CREATED, user)
}

async fn logout(State(db): State<Db>, headers: HeaderMap) -> StatusCode {
    let mut store = db.write().await;
    match bearer(&headers).and_then(|token| store.sessions.remove(token)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::UNAUTHORIZED,
    }
}

async fn current_user(State(db): State<Db>, headers: HeaderMap) -> Enveloped<User> {
    let store = db.read().await;
    let user = store.user_for(&headers)?;
    envelope(StatusCode::OK, user)
}

async fn update_user(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UpdateUser>,
) -> Enveloped<User> {
    let mut store = db.write().await;
    let user_id = store.user_for(&headers)?.id;
    let account = store
        .accounts
        .get_mut(&user_id)
        .ok_or(StatusCode::UNAUTHORIZED)?;
    if let Some(name) = input.name {
        account.user.name = name;
    }
    if let Some(email) = input.email {
        account.user.email = email;
    }
    if let Some(phone) = input.phone {
        account.user.phone = Some(phone);
    }
    envelope(StatusCode::OK, account.user.clone())
}

async fn list_addresses(State(db): State<Db>, headers: HeaderMap) -> Enveloped<Vec<Address>> {
    let store = db.read().await;
    let user = store.user_for(&headers)?;
    let addresses = store.addresses.get(&user.id).cloned().unwrap_or_default();
    envelope(StatusCode::OK, addresses)
}

async fn create_address(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateAddress>,
) -> Enveloped<Address> {
    let mut store = db.write().await;
    let user = store.user_for(&headers)?;
    let address = Address {
        id: Uuid::new_v4().to_string(),
        line1: input.line1,
        line2: input.line2,
        city: input.city,
        postal_code: input.postal_code,
        country: input.country,
    };
    store
        .addresses
        .entry(user.id)
        .or_default()
        .push(address.clone());
    envelope(StatusCode::CREATED, address)
}

async fn list_products(
    State(db): State<Db>,
    Query(query): Query<ProductQuery>,
) -> Enveloped<Vec<Product>> {
    let store = db.read().await;
    let search = query.search.map(|s| s.to_lowercase());
    let products = store
        .products
        .values()
        .filter(|p| {
            query
                .category_id
                .as_ref()
                .map_or(true, |c| p.category_id.as_ref() == Some(c))
        })
        .filter(|p| {
            search
                .as_ref()
                .map_or(true, |s| p.name.to_lowercase().contains(s.as_str()))
        })
        .filter(|p| query.min_price.map_or(true, |min| p.price >= min))
        .filter(|p| query.max_price.map_or(true, |max| p.price <= max))
        .cloned()
        .collect();
    envelope(StatusCode::OK, products)
}

async fn get_product(State(db): State<Db>, Path(id): Path<String>) -> Enveloped<Product> {
    let store = db.read().await;
    let product = store
        .products
        .get(&id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    envelope(StatusCode::OK, product)
}

async fn create_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateProduct>,
) -> Enveloped<Product> {
    let mut store = db.write().await;
    store.user_for(&headers)?;
    let product = Product {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        description: input.description,
        price: input.price,
        category_id: input.category_id,
    };
    store.stock.insert(
        product.id.clone(),
        StockInfo {
            product_id: product.id.clone(),
            quantity: 0,
            reserved: 0,
        },
    );
    store.products.insert(product.id.clone(), product.clone());
    envelope(StatusCode::CREATED, product)
}

async fn update_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateProduct>,
) -> Enveloped<Product> {
    let mut store = db.write().await;
    store.user_for(&headers)?;
    let product = store.products.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        product.name = name;
    }
    if let Some(description) = input.description {
        product.description = description;
    }
    if let Some(price) = input.price {
        product.price = price;
    }
    if let Some(category_id) = input.category_id {
        product.category_id = Some(category_id);
    }
    envelope(StatusCode::OK, product.clone())
}

async fn delete_product(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let mut store = db.write().await;
    store.user_for(&headers)?;
    store.stock.remove(&id);
    store
        .products
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn list_categories(State(db): State<Db>) -> Enveloped<Vec<Category>> {
    let store = db.read().await;
    envelope(StatusCode::OK, store.categories.clone())
}

async fn list_orders(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<OrderQuery>,
) -> Enveloped<Vec<Order>> {
    let store = db.read().await;
    let user = store.user_for(&headers)?;
    let statuses: Vec<&str> = query
        .status
        .as_deref()
        .map(|s| s.split(',').collect())
        .unwrap_or_default();
    let orders = store
        .orders
        .iter()
        .filter(|o| o.user_id == user.id)
        .filter(|o| statuses.is_empty() || statuses.contains(&o.status.as_str()))
        .cloned()
        .collect();
    envelope(StatusCode::OK, orders)
}

async fn get_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Enveloped<Order> {
    let store = db.read().await;
    let user = store.user_for(&headers)?;
    let order = store
        .orders
        .iter()
        .find(|o| o.id == id && o.user_id == user.id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    envelope(StatusCode::OK, order)
}

async fn create_order(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateOrder>,
) -> Enveloped<Order> {
    let mut store = db.write().await;
    let user = store.user_for(&headers)?;
    if input.items.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut total = 0.0;
    for item in &input.items {
        let product = store
            .products
            .get(&item.product_id)
            .ok_or(StatusCode::UNPROCESSABLE_ENTITY)?;
        let available = store
            .stock
            .get(&item.product_id)
            .map(|s| s.quantity - s.reserved)
            .unwrap_or_default();
        if available < i64::from(item.quantity) {
            return Err(StatusCode::CONFLICT);
        }
        total += product.price * f64::from(item.quantity);
    }
    for item in &input.items {
        if let Some(stock) = store.stock.get_mut(&item.product_id) {
            stock.quantity -= i64::from(item.quantity);
        }
    }
    let order = Order {
        id: Uuid::new_v4().to_string(),
        user_id: user.id,
        items: input.items,
        status: "created".to_string(),
        total,
    };
    store.orders.push(order.clone());
    envelope(StatusCode::CREATED, order)
}

async fn get_stock(State(db): State<Db>, Path(product_id): Path<String>) -> Enveloped<StockInfo> {
    let store = db.read().await;
    let stock = store
        .stock
        .get(&product_id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    envelope(StatusCode::OK, stock)
}

async fn get_wallet(State(db): State<Db>, headers: HeaderMap) -> Enveloped<Wallet> {
    let store = db.read().await;
    let user = store.user_for(&headers)?;
    let wallet = store
        .wallets
        .get(&user.id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;
    envelope(StatusCode::OK, wallet)
}

async fn list_transactions(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<TransactionQuery>,
) -> Enveloped<Vec<Transaction>> {
    let store = db.read().await;
    let user = store.user_for(&headers)?;
    let wallet_id = store
        .wallets
        .get(&user.id)
        .map(|w| w.id.clone())
        .ok_or(StatusCode::NOT_FOUND)?;
    let transactions = store
        .transactions
        .iter()
        .filter(|t| t.wallet_id == wallet_id)
        .filter(|t| query.kind.as_ref().map_or(true, |k| &t.kind == k))
        .filter(|t| query.from.as_ref().map_or(true, |f| t.created_at >= *f))
        .filter(|t| query.to.as_ref().map_or(true, |to| t.created_at <= *to))
        .cloned()
        .collect();
    envelope(StatusCode::OK, transactions)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP", "version": env!("CARGO_PKG_VERSION") }))
}
