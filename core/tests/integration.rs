//! End-to-end tests against the live mock shop server.
//!
//! # Design
//! Starts the mock server on a random port, then drives a `Session` built
//! with the real reqwest transport over HTTP. Validates that request
//! building, token handling and envelope unwrapping work with an actual
//! server.

use std::net::SocketAddr;

use shop_core::{
    ApiError, Config, CreateAddress, CreateOrder, CreateProduct, OrderFilter, OrderItem, ProductFilter, Session,
    TokenStorage, TransactionFilter, UpdateProduct, UpdateUser,
};

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    addr
}

fn session(addr: SocketAddr) -> Session {
    let config = Config::new(&format!("http://{addr}/"))
        .with_timeout_seconds(5)
        .with_debug(true)
        .with_storage(TokenStorage::Memory);
    Session::new(config).unwrap()
}

#[tokio::test]
async fn health_check_is_raw() {
    let s = session(start_server().await);
    let health = s.health_check().await.unwrap();
    assert_eq!(health.status, "UP");
}

#[tokio::test]
async fn login_then_authenticated_calls() {
    let s = session(start_server().await);
    assert!(!s.is_authenticated());

    // Protected call before login is a protocol failure, not a panic.
    let err = s.get_current_user().await.unwrap_err();
    assert_eq!(err.status(), Some(401));

    let login = s.login(mock_server::SEED_EMAIL, mock_server::SEED_PASSWORD).await.unwrap();
    assert!(s.is_authenticated());
    assert_eq!(s.stored_token(), Some(login.token.clone()));

    // The server only answers /user/me for the token it issued.
    let me = s.get_current_user().await.unwrap();
    assert_eq!(me, login.user);

    let updated = s
        .update_user(&UpdateUser {
            phone: Some("+100".to_string()),
            ..UpdateUser::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.phone.as_deref(), Some("+100"));
    assert_eq!(updated.name, me.name);
}

#[tokio::test]
async fn wrong_password_leaves_session_unauthenticated() {
    let s = session(start_server().await);
    let err = s.login(mock_server::SEED_EMAIL, "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::Protocol { status: 401, .. }));
    assert!(!s.is_authenticated());
}

#[tokio::test]
async fn logout_revokes_remotely_and_clears_locally() {
    let s = session(start_server().await);
    let login = s.login(mock_server::SEED_EMAIL, mock_server::SEED_PASSWORD).await.unwrap();
    s.logout().await.unwrap();
    assert!(!s.is_authenticated());

    // A second logout has no token to send; the server refuses, the local
    // state stays cleared.
    let err = s.logout().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!s.is_authenticated());

    // The old token no longer works.
    let stale = session_with_token(&s, &login.token);
    assert_eq!(stale.get_wallet().await.unwrap_err().status(), Some(401));
}

/// A fresh session that already holds `token`, without logging in.
fn session_with_token(s: &Session, token: &str) -> Session {
    let tokens = shop_core::TokenStore::in_memory();
    tokens.save(token).unwrap();
    Session::with_parts(
        s.config().clone(),
        std::sync::Arc::new(shop_core::ReqwestTransport::new(s.config()).unwrap()),
        tokens,
    )
    .unwrap()
}

#[tokio::test]
async fn catalog_reads() {
    let s = session(start_server().await);

    let product = s.get_product("p1").await.unwrap();
    assert_eq!(product.id, "p1");
    assert_eq!(product.name, "Tea");

    let err = s.get_product("missing").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Protocol {
            status: 404,
            message: "Not Found".to_string()
        }
    );

    let all = s.get_products(None).await.unwrap();
    let all_empty_filter = s.get_products(Some(&ProductFilter::default())).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all, all_empty_filter);

    let drinks = s
        .get_products(Some(&ProductFilter {
            category_id: Some("c1".to_string()),
            ..ProductFilter::default()
        }))
        .await
        .unwrap();
    assert_eq!(drinks.len(), 2);

    let cheap = s
        .get_products(Some(&ProductFilter {
            max_price: Some(5.0),
            ..ProductFilter::default()
        }))
        .await
        .unwrap();
    assert_eq!(cheap.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["p1"]);

    let categories = s.get_categories().await.unwrap();
    assert_eq!(categories.len(), 2);

    let stock = s.get_stock("p1").await.unwrap();
    assert_eq!(stock.product_id, "p1");
    assert_eq!(stock.quantity, 10);
}

#[tokio::test]
async fn product_writes() {
    let s = session(start_server().await);
    s.login(mock_server::SEED_EMAIL, mock_server::SEED_PASSWORD).await.unwrap();

    let created = s
        .create_product(&CreateProduct {
            name: "Kettle".to_string(),
            description: "Boils water".to_string(),
            price: 25.0,
            category_id: Some("c2".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(created.name, "Kettle");

    let updated = s
        .update_product(
            &created.id,
            &UpdateProduct {
                price: Some(20.0),
                ..UpdateProduct::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, 20.0);
    assert_eq!(updated.name, "Kettle");

    s.delete_product(&created.id).await.unwrap();
    assert_eq!(s.get_product(&created.id).await.unwrap_err().status(), Some(404));
}

#[tokio::test]
async fn orders_and_wallet() {
    let s = session(start_server().await);
    s.login(mock_server::SEED_EMAIL, mock_server::SEED_PASSWORD).await.unwrap();

    assert!(s.get_orders(None).await.unwrap().is_empty());

    let order = s
        .create_order(&CreateOrder {
            items: vec![OrderItem {
                product_id: "p3".to_string(),
                quantity: 2,
            }],
            address_id: None,
        })
        .await
        .unwrap();
    assert_eq!(order.total, 24.0);
    assert_eq!(s.get_order(&order.id).await.unwrap(), order);
    assert_eq!(s.get_stock("p3").await.unwrap().quantity, 3);

    let created = s
        .get_orders(Some(&OrderFilter {
            status: vec!["created".to_string()],
        }))
        .await
        .unwrap();
    assert_eq!(created.len(), 1);

    let err = s
        .create_order(&CreateOrder {
            items: vec![OrderItem {
                product_id: "p2".to_string(),
                quantity: 1,
            }],
            address_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));

    let wallet = s.get_wallet().await.unwrap();
    assert_eq!(wallet.currency, "EUR");

    let all = s.get_transactions(None).await.unwrap();
    assert_eq!(all.len(), 2);
    let debits = s
        .get_transactions(Some(&TransactionFilter {
            kind: Some("debit".to_string()),
            ..TransactionFilter::default()
        }))
        .await
        .unwrap();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].kind, "debit");
}

#[tokio::test]
async fn addresses() {
    let s = session(start_server().await);
    s.login(mock_server::SEED_EMAIL, mock_server::SEED_PASSWORD).await.unwrap();
    assert!(s.get_addresses().await.unwrap().is_empty());

    let address = s
        .create_address(&CreateAddress {
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(s.get_addresses().await.unwrap(), vec![address]);
}

#[tokio::test]
async fn register_then_login() {
    let s = session(start_server().await);
    let user = s
        .register(&shop_core::RegisterRequest {
            email: "new@b.com".to_string(),
            password: "secret".to_string(),
            name: "New".to_string(),
            phone: None,
        })
        .await
        .unwrap();
    assert_eq!(user.email, "new@b.com");
    assert!(!s.is_authenticated());

    let login = s.login("new@b.com", "secret").await.unwrap();
    assert_eq!(login.user.id, user.id);
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let s = session(addr);
    let err = s.health_check().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn file_backed_token_survives_new_session() {
    let addr = start_server().await;
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(&format!("http://{addr}/")).with_storage(TokenStorage::File {
        dir: Some(dir.path().to_path_buf()),
        namespace: "it".to_string(),
    });

    let first = Session::new(config.clone()).unwrap();
    first.login(mock_server::SEED_EMAIL, mock_server::SEED_PASSWORD).await.unwrap();
    drop(first);

    let second = Session::new(config).unwrap();
    assert!(second.is_authenticated());
    assert_eq!(second.get_current_user().await.unwrap().email, mock_server::SEED_EMAIL);
}
