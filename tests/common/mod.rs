#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use quickshop_cart::{
    config::AppConfig,
    db,
    entities::{commerce::cart, commerce::cart_item, product, user},
    events::{Event, EventSender},
    services::commerce::CartService,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set,
    Statement,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness backed by a fresh SQLite database.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub carts: CartService,
    events: mpsc::Receiver<Event>,
    // Holds the database file of a file-backed harness.
    _dir: Option<TempDir>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        // One pooled connection keeps every query on the same in-memory database.
        let mut cfg = AppConfig::new("sqlite::memory:");
        cfg.environment = "test".to_string();
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::create_schema(&pool)
            .await
            .expect("failed to create cart schema");

        Self::with_pool(pool, &cfg, None)
    }

    /// Construct a test application on a WAL-mode database file served by a
    /// pool of `max_connections`, so statements from different tasks really
    /// run side by side.
    pub async fn file_backed(max_connections: u32) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("cart.db").display());

        let mut cfg = AppConfig::new(url);
        cfg.environment = "test".to_string();
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        // Journal mode is stored in the file; switch it before other connections open.
        let bootstrap = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("Failed to create database file");
        bootstrap
            .execute(Statement::from_string(
                bootstrap.get_database_backend(),
                "PRAGMA journal_mode=WAL;".to_string(),
            ))
            .await
            .expect("Failed to enable WAL");
        db::create_schema(&bootstrap)
            .await
            .expect("Failed to create cart schema");
        db::close_pool(bootstrap)
            .await
            .expect("Failed to close bootstrap connection");

        cfg.db_max_connections = max_connections;
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("Failed to open database pool");

        Self::with_pool(pool, &cfg, Some(dir))
    }

    fn with_pool(pool: DatabaseConnection, cfg: &AppConfig, dir: Option<TempDir>) -> Self {
        let (tx, rx) = mpsc::channel(cfg.event_channel_capacity);
        let db = Arc::new(pool);
        let carts = CartService::new(db.clone(), Arc::new(EventSender::new(tx)));

        Self {
            db,
            carts,
            events: rx,
            _dir: dir,
        }
    }

    pub async fn seed_user(&self) -> i32 {
        user::ActiveModel {
            email: Set(format!("shopper-{}@example.com", Uuid::new_v4())),
            name: Set(Some("Test Shopper".to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("Failed to seed user")
        .id
    }

    pub async fn seed_product(&self, name: &str, price: Decimal) -> i32 {
        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("Failed to seed product")
        .id
    }

    pub async fn cart_count(&self) -> u64 {
        cart::Entity::find()
            .count(&*self.db)
            .await
            .expect("Failed to count carts")
    }

    pub async fn line_count(&self) -> u64 {
        cart_item::Entity::find()
            .count(&*self.db)
            .await
            .expect("Failed to count cart lines")
    }

    pub async fn execute_raw(&self, sql: &str) {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                sql.to_string(),
            ))
            .await
            .expect("Failed to execute raw SQL");
    }

    /// Events published so far, in order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
