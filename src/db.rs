//! Analytical store: an embedded SurrealDB holding the raw Olist tables and
//! the tables derived from them.
//!
//! Every stage receives the connection explicitly and only overwrites the
//! tables it owns. Writers are expected to be serialised by the caller.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;
use tracing::info;

pub type DbConn = Surreal<Db>;

pub const CUSTOMERS: &str = "customers";
pub const ORDERS: &str = "orders";
pub const ORDER_ITEMS: &str = "order_items";
pub const ORDER_PAYMENTS: &str = "order_payments";
pub const ORDER_REVIEWS: &str = "order_reviews";
pub const PRODUCTS: &str = "products";
pub const SELLERS: &str = "sellers";
pub const ORDER_DELIVERY_METRICS: &str = "order_delivery_metrics";
pub const ML_DELIVERY_DATASET: &str = "ml_delivery_dataset";

const INSERT_BATCH_SIZE: usize = 5000;

/// Initialize database connection with RocksDB backend
pub async fn connect(path: &str) -> Result<DbConn> {
    let db = Surreal::new::<RocksDb>(path)
        .await
        .with_context(|| format!("opening analytical store at {}", path))?;
    db.use_ns("olist").use_db("ecommerce").await?;
    Ok(db)
}

/// Volatile store, used by tests and throwaway runs.
pub async fn connect_in_memory() -> Result<DbConn> {
    let db = Surreal::new::<Mem>(()).await?;
    db.use_ns("olist").use_db("ecommerce").await?;
    Ok(db)
}

/// Initialize database schema
pub async fn init_schema(db: &DbConn) -> Result<()> {
    db.query(
        r#"
        -- Raw entity tables
        DEFINE TABLE IF NOT EXISTS customers SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_customers_id ON customers FIELDS customer_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS orders SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_orders_id ON orders FIELDS order_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_orders_customer ON orders FIELDS customer_id;
        DEFINE INDEX IF NOT EXISTS idx_orders_status ON orders FIELDS order_status;

        DEFINE TABLE IF NOT EXISTS order_items SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_order_items_order ON order_items FIELDS order_id;

        DEFINE TABLE IF NOT EXISTS order_payments SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_order_payments_order ON order_payments FIELDS order_id;

        DEFINE TABLE IF NOT EXISTS order_reviews SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_order_reviews_order ON order_reviews FIELDS order_id;

        DEFINE TABLE IF NOT EXISTS products SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_products_id ON products FIELDS product_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS sellers SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_sellers_id ON sellers FIELDS seller_id UNIQUE;

        -- Derived tables
        DEFINE TABLE IF NOT EXISTS order_delivery_metrics SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_metrics_order ON order_delivery_metrics FIELDS order_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS ml_delivery_dataset SCHEMALESS;
        "#,
    )
    .await?
    .check()?;

    Ok(())
}

/// Ordering key used when reading a table back, so reads are reproducible.
fn sort_key(table: &str) -> &'static str {
    match table {
        CUSTOMERS => "customer_id",
        SELLERS => "seller_id",
        PRODUCTS => "product_id",
        ORDER_ITEMS => "order_id, order_item_id",
        ORDER_PAYMENTS => "order_id, payment_sequential",
        ORDER_REVIEWS => "order_id, review_id",
        _ => "order_id",
    }
}

/// Overwrite `table` with `rows`.
pub async fn replace_table<T>(db: &DbConn, table: &str, rows: &[T]) -> Result<usize>
where
    T: Serialize + Clone + 'static,
{
    db.query(format!("DELETE {}", table))
        .await?
        .check()
        .with_context(|| format!("clearing table {}", table))?;

    for (i, chunk) in rows.chunks(INSERT_BATCH_SIZE).enumerate() {
        db.query(format!("INSERT INTO {} $rows", table))
            .bind(("rows", chunk.to_vec()))
            .await?
            .check()
            .with_context(|| format!("inserting batch {} into {}", i, table))?;
        info!("{}: wrote {} rows", table, (i * INSERT_BATCH_SIZE) + chunk.len());
    }

    Ok(rows.len())
}

/// Read a whole table as typed rows, ordered by its natural key.
pub async fn load_table<T>(db: &DbConn, table: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let rows: Vec<T> = db
        .query(format!("SELECT * FROM {} ORDER BY {}", table, sort_key(table)))
        .await?
        .take(0)
        .with_context(|| format!("reading table {}", table))?;
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: i64,
}

/// Number of rows in `table` (0 for a missing or empty table).
pub async fn count(db: &DbConn, table: &str) -> Result<i64> {
    let row: Option<CountRow> = db
        .query(format!("SELECT count() AS count FROM {} GROUP ALL", table))
        .await?
        .take(0)?;
    Ok(row.map(|r| r.count).unwrap_or(0))
}
