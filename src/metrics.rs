//! Per-order delivery timing derived from the raw orders table.

use anyhow::Result;
use tracing::info;

use crate::db::{self, DbConn};
use crate::models::{DeliveryMetric, Order};

/// Timing metrics for one order, or `None` when the delivery outcome is unknown.
///
/// Day counts are whole calendar days between the purchase date and the
/// delivery / estimated-delivery dates. Orders missing either timestamp, or
/// whose day counts come out negative, produce no metric.
pub fn derive_metric(order: &Order) -> Option<DeliveryMetric> {
    let delivered = order.delivered_customer_at?;
    let estimated = order.estimated_delivery_at?;
    let purchase_date = order.purchase_ts.date();

    let delivery_days = (delivered.date() - purchase_date).num_days();
    let estimated_delivery_days = (estimated.date() - purchase_date).num_days();
    if delivery_days < 0 || estimated_delivery_days < 0 {
        return None;
    }

    Some(DeliveryMetric {
        order_id: order.order_id.clone(),
        customer_id: order.customer_id.clone(),
        delivery_days,
        estimated_delivery_days,
        delay_vs_estimate_days: delivery_days - estimated_delivery_days,
        purchase_ts: order.purchase_ts,
    })
}

/// Metrics for every qualifying order, ordered by order id.
pub fn derive_all(orders: &[Order]) -> Vec<DeliveryMetric> {
    let mut metrics: Vec<DeliveryMetric> = orders.iter().filter_map(derive_metric).collect();
    metrics.sort_by(|a, b| a.order_id.cmp(&b.order_id));
    metrics
}

/// Recompute `order_delivery_metrics` from `orders`, replacing any previous contents.
pub async fn materialize(db: &DbConn) -> Result<Vec<DeliveryMetric>> {
    let orders: Vec<Order> = db::load_table(db, db::ORDERS).await?;
    let metrics = derive_all(&orders);

    info!(
        "Derived delivery metrics for {} of {} orders ({} without complete delivery data)",
        metrics.len(),
        orders.len(),
        orders.len() - metrics.len()
    );

    db::replace_table(db, db::ORDER_DELIVERY_METRICS, &metrics).await?;
    Ok(metrics)
}

/// Read the materialized metrics table.
pub async fn load(db: &DbConn) -> Result<Vec<DeliveryMetric>> {
    db::load_table(db, db::ORDER_DELIVERY_METRICS).await
}
