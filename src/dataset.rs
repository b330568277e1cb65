//! Model-ready feature dataset: delivery metrics joined with items,
//! customers, sellers and products, one row per (order, item).

use anyhow::{Context, Result};
use chrono::Datelike;
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::db::{self, DbConn};
use crate::models::{Customer, DeliveryMetric, FeatureRow, OrderItem, Product, Seller};

/// Rows dropped while joining, reported in aggregate only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub items_without_metric: usize,
    pub missing_customer: usize,
    pub missing_seller: usize,
    pub missing_product: usize,
}

/// Inner-join the metric table with items and dimensions.
///
/// Output order is (order_id, order_item_id) so rebuilding from an
/// unchanged store yields an identical dataset.
pub fn build_rows(
    metrics: &[DeliveryMetric],
    items: &[OrderItem],
    customers: &[Customer],
    sellers: &[Seller],
    products: &[Product],
) -> (Vec<FeatureRow>, JoinStats) {
    let metric_by_order: HashMap<&str, &DeliveryMetric> =
        metrics.iter().map(|m| (m.order_id.as_str(), m)).collect();
    let customer_by_id: HashMap<&str, &Customer> =
        customers.iter().map(|c| (c.customer_id.as_str(), c)).collect();
    let seller_by_id: HashMap<&str, &Seller> =
        sellers.iter().map(|s| (s.seller_id.as_str(), s)).collect();
    let product_by_id: HashMap<&str, &Product> =
        products.iter().map(|p| (p.product_id.as_str(), p)).collect();

    let mut ordered_items: Vec<&OrderItem> = items.iter().collect();
    ordered_items.sort_by(|a, b| {
        a.order_id
            .cmp(&b.order_id)
            .then(a.order_item_id.cmp(&b.order_item_id))
    });

    let mut stats = JoinStats::default();
    let mut rows = Vec::new();

    for item in ordered_items {
        let Some(metric) = metric_by_order.get(item.order_id.as_str()) else {
            stats.items_without_metric += 1;
            continue;
        };
        let Some(customer) = customer_by_id.get(metric.customer_id.as_str()) else {
            stats.missing_customer += 1;
            continue;
        };
        let Some(seller) = seller_by_id.get(item.seller_id.as_str()) else {
            stats.missing_seller += 1;
            continue;
        };
        let Some(product) = product_by_id.get(item.product_id.as_str()) else {
            stats.missing_product += 1;
            continue;
        };

        let purchase_date = metric.purchase_ts.date();
        rows.push(FeatureRow {
            order_id: metric.order_id.clone(),
            customer_unique_id: customer.customer_unique_id.clone(),
            customer_state: customer.customer_state.clone(),
            seller_state: seller.seller_state.clone(),
            product_category_name: product.product_category_name.clone(),
            price: item.price,
            freight_value: item.freight_value,
            delivery_days: metric.delivery_days,
            estimated_delivery_days: metric.estimated_delivery_days,
            is_late: metric.is_late(),
            purchase_date,
            purchase_dow: purchase_date.weekday().num_days_from_sunday(),
            purchase_month: purchase_date.month(),
            purchase_year: purchase_date.year(),
        });
    }

    (rows, stats)
}

/// Rebuild `ml_delivery_dataset` from the store and export it to `output` as CSV.
pub async fn materialize(db: &DbConn, output: &Path) -> Result<Vec<FeatureRow>> {
    let metrics: Vec<DeliveryMetric> = db::load_table(db, db::ORDER_DELIVERY_METRICS).await?;
    let items: Vec<OrderItem> = db::load_table(db, db::ORDER_ITEMS).await?;
    let customers: Vec<Customer> = db::load_table(db, db::CUSTOMERS).await?;
    let sellers: Vec<Seller> = db::load_table(db, db::SELLERS).await?;
    let products: Vec<Product> = db::load_table(db, db::PRODUCTS).await?;

    info!(
        "Joining {} metric rows with {} items, {} customers, {} sellers, {} products",
        metrics.len(),
        items.len(),
        customers.len(),
        sellers.len(),
        products.len()
    );

    let (rows, stats) = build_rows(&metrics, &items, &customers, &sellers, &products);
    debug!("Join drops: {:?}", stats);

    let late = rows.iter().filter(|r| r.is_late).count();
    info!("Built {} feature rows ({} late)", rows.len(), late);

    db::replace_table(db, db::ML_DELIVERY_DATASET, &rows).await?;
    write_csv(output, &rows)?;
    info!("ML dataset saved to {}", output.display());

    Ok(rows)
}

pub fn write_csv(path: &Path, rows: &[FeatureRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_csv(path: &Path) -> Result<Vec<FeatureRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening dataset {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<FeatureRow>, _>>()
        .with_context(|| format!("parsing dataset {}", path.display()))?;
    Ok(rows)
}
