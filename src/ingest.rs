//! Load the raw Olist CSV exports into the analytical store.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use crate::db::{self, DbConn};
use crate::models::{
    Customer, OrderCsvRecord, OrderItemCsvRecord, OrderPayment, OrderReviewCsvRecord,
    ProductCsvRecord, Seller,
};

pub const CUSTOMERS_CSV: &str = "olist_customers_dataset.csv";
pub const ORDERS_CSV: &str = "olist_orders_dataset.csv";
pub const ORDER_ITEMS_CSV: &str = "olist_order_items_dataset.csv";
pub const ORDER_PAYMENTS_CSV: &str = "olist_order_payments_dataset.csv";
pub const ORDER_REVIEWS_CSV: &str = "olist_order_reviews_dataset.csv";
pub const PRODUCTS_CSV: &str = "olist_products_dataset.csv";
pub const SELLERS_CSV: &str = "olist_sellers_dataset.csv";

const MAX_LOGGED_ERRORS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoad {
    pub table: &'static str,
    pub rows: usize,
    pub skipped: usize,
}

/// Deserialize every record of `path`, then convert it. Records failing
/// either step are skipped and counted.
fn read_converted<R, T, F>(path: &Path, convert: F) -> Result<(Vec<T>, usize)>
where
    R: DeserializeOwned,
    F: Fn(&R) -> Result<T>,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    let mut errors = 0;

    for (i, record) in reader.deserialize::<R>().enumerate() {
        let converted = record
            .map_err(anyhow::Error::from)
            .and_then(|r| convert(&r));
        match converted {
            Ok(row) => rows.push(row),
            Err(e) => {
                if errors < MAX_LOGGED_ERRORS {
                    warn!("{}: skipping record {}: {}", path.display(), i, e);
                }
                errors += 1;
            }
        }
    }

    Ok((rows, errors))
}

async fn load_into<R, T, F>(
    db: &DbConn,
    raw_dir: &Path,
    file: &str,
    table: &'static str,
    convert: F,
) -> Result<TableLoad>
where
    R: DeserializeOwned,
    T: Serialize + Clone + 'static,
    F: Fn(&R) -> Result<T>,
{
    let path = raw_dir.join(file);
    info!("Loading {} into table {}...", file, table);
    let (rows, skipped) = read_converted(&path, convert)?;
    db::replace_table(db, table, &rows).await?;
    info!("  {}: {} rows ({} skipped)", table, rows.len(), skipped);
    Ok(TableLoad { table, rows: rows.len(), skipped })
}

/// Replace all raw tables with the contents of `raw_dir`.
pub async fn ingest_all(db: &DbConn, raw_dir: &Path) -> Result<Vec<TableLoad>> {
    db::init_schema(db).await?;

    Ok(vec![
        load_into(db, raw_dir, CUSTOMERS_CSV, db::CUSTOMERS, |r: &Customer| Ok(r.clone())).await?,
        load_into(db, raw_dir, ORDERS_CSV, db::ORDERS, OrderCsvRecord::to_order).await?,
        load_into(db, raw_dir, ORDER_ITEMS_CSV, db::ORDER_ITEMS, OrderItemCsvRecord::to_order_item).await?,
        load_into(db, raw_dir, ORDER_PAYMENTS_CSV, db::ORDER_PAYMENTS, |r: &OrderPayment| Ok(r.clone())).await?,
        load_into(db, raw_dir, ORDER_REVIEWS_CSV, db::ORDER_REVIEWS, OrderReviewCsvRecord::to_review).await?,
        load_into(db, raw_dir, PRODUCTS_CSV, db::PRODUCTS, |r: &ProductCsvRecord| Ok(r.to_product())).await?,
        load_into(db, raw_dir, SELLERS_CSV, db::SELLERS, |r: &Seller| Ok(r.clone())).await?,
    ])
}
