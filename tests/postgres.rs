//! Repository behaviour against a live database.
//!
//! Set `TEST_DATABASE_URL` to a scratch Postgres database to run these; they
//! return early when it is unset. Migrations are applied on first connect.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use marketplace_commerce::auth::issue_token;
use marketplace_commerce::db::products::NewProduct;
use marketplace_commerce::db::users::NewUser;
use marketplace_commerce::db::{CartRepository, OrderRepository, ProductRepository, RepositoryError, StoreRepository, UserRepository};
use marketplace_commerce::domain::value_objects::{Money, Quantity, Role};
use marketplace_commerce::events::EventPublisher;
use marketplace_commerce::{build_router, AppState, Config};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use uuid::Uuid;

const SECRET: &str = "postgres-test-secret-that-is-long-enough-01";

async fn pool() -> Option<(PgPool, String)> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return None;
    };
    let pool = PgPoolOptions::new().max_connections(10).connect(&url).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some((pool, url))
}

fn new_user(email: &str, role: Role) -> NewUser<'_> {
    NewUser { email, name: "Test Account", phone: None, password_hash: "not-a-real-hash".to_string(), role }
}

struct Shop {
    store_id: Uuid,
    product_id: Uuid,
    buyer_id: Uuid,
}

async fn open_shop(pool: &PgPool, stock: i32) -> Shop {
    let users = UserRepository::new(pool);
    let seller_email = format!("seller-{}@example.com", Uuid::now_v7());
    let (_, seller) = users.register(new_user(&seller_email, Role::Seller), Some("Corner Shop")).await.unwrap();
    let store = StoreRepository::new(pool).create(seller.unwrap().id, "Corner Shop", None).await.unwrap();
    let product = ProductRepository::new(pool)
        .create(NewProduct {
            store_id: store.id,
            name: "Widget",
            category: None,
            price: Money::from_cents(250),
            stock,
            images: &[],
        })
        .await
        .unwrap();
    let buyer_email = format!("buyer-{}@example.com", Uuid::now_v7());
    let buyer = users.create(new_user(&buyer_email, Role::User)).await.unwrap();
    Shop { store_id: store.id, product_id: product.id, buyer_id: buyer.id }
}

fn is_deadlock(result: &Result<impl fmt::Debug, RepositoryError>) -> bool {
    match result {
        Err(RepositoryError::Database(e)) => e.as_database_error().and_then(|db| db.code()).as_deref() == Some("40P01"),
        _ => false,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn add_item_and_checkout_run_concurrently_without_deadlock() {
    let Some((pool, _)) = pool().await else { return };
    let shop = open_shop(&pool, 10_000).await;
    let one = Quantity::new(1).unwrap();

    for _ in 0..25 {
        CartRepository::new(&pool).add_item(shop.buyer_id, shop.store_id, shop.product_id, one).await.unwrap();

        let add = {
            let pool = pool.clone();
            let shop = (shop.buyer_id, shop.store_id, shop.product_id);
            tokio::spawn(async move { CartRepository::new(&pool).add_item(shop.0, shop.1, shop.2, one).await })
        };
        let checkout = {
            let pool = pool.clone();
            let (buyer, store) = (shop.buyer_id, shop.store_id);
            tokio::spawn(async move { OrderRepository::new(&pool).checkout(buyer, store, 5).await })
        };
        let added = add.await.unwrap();
        let placed = checkout.await.unwrap();

        assert!(!is_deadlock(&added), "add_item deadlocked: {added:?}");
        assert!(!is_deadlock(&placed), "checkout deadlocked: {placed:?}");
        assert!(added.is_ok(), "add_item failed: {added:?}");
        assert!(placed.is_ok(), "checkout failed: {placed:?}");
    }
}

#[tokio::test]
async fn add_item_for_another_stores_product_leaves_no_cart() {
    let Some((pool, _)) = pool().await else { return };
    let shop = open_shop(&pool, 10).await;
    let other = open_shop(&pool, 10).await;
    let carts = CartRepository::new(&pool);

    let result = carts.add_item(shop.buyer_id, other.store_id, shop.product_id, Quantity::new(1).unwrap()).await;

    assert!(matches!(result, Err(RepositoryError::NotFound("Product"))));
    assert!(carts.view(shop.buyer_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn seller_signup_creates_user_and_profile_together() {
    let Some((pool, _)) = pool().await else { return };
    let users = UserRepository::new(&pool);
    let email = format!("maker-{}@example.com", Uuid::now_v7());

    let (user, seller) = users.register(new_user(&email, Role::Seller), Some("Maker Goods")).await.unwrap();

    let seller = seller.unwrap();
    assert_eq!(seller.user_id, user.id);
    assert_eq!(seller.business_name, "Maker Goods");
    assert_eq!(users.seller_for_user(user.id).await.unwrap().id, seller.id);
}

#[tokio::test]
async fn failed_seller_profile_rolls_back_the_account() {
    let Some((pool, _)) = pool().await else { return };
    let users = UserRepository::new(&pool);
    let email = format!("broken-{}@example.com", Uuid::now_v7());

    // Postgres rejects NUL bytes in text, so the profile insert fails after the user row.
    let result = users.register(new_user(&email, Role::Seller), Some("Bad\0Name")).await;

    assert!(matches!(result, Err(RepositoryError::Database(_))));
    assert!(users.find_by_email(&email).await.unwrap().is_none());
}

/// Counts events whose message equals `message`.
struct MessageCounter {
    message: &'static str,
    hits: Arc<AtomicUsize>,
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for MessageCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if visitor.0.as_deref() == Some(self.message) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn checkout_over_http_logs_the_order_once() {
    let Some((pool, url)) = pool().await else { return };
    let shop = open_shop(&pool, 10).await;
    CartRepository::new(&pool)
        .add_item(shop.buyer_id, shop.store_id, shop.product_id, Quantity::new(2).unwrap())
        .await
        .unwrap();

    let config = Config::from_lookup(move |key: &str| match key {
        "DATABASE_URL" => Some(url.clone()),
        "JWT_SECRET" => Some(SECRET.to_string()),
        _ => None,
    })
    .unwrap();
    let app = build_router(AppState::new(pool, config, EventPublisher::default()));
    let token = issue_token(shop.buyer_id, Role::User, SECRET.as_bytes(), 1).unwrap();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/order/checkout")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "store_id": shop.store_id }).to_string()))
        .unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(MessageCounter { message: "order placed", hits: Arc::clone(&hits) });
    let _guard = tracing::subscriber::set_default(subscriber);
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
