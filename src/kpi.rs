//! Delivery KPIs over the materialized metric table.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::db::{self, DbConn};
use crate::models::DeliveryMetric;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub n_orders: i64,
    pub avg_delivery_days: f64,
    pub late_rate: f64,
}

impl Kpis {
    pub fn empty() -> Self {
        Self { n_orders: 0, avg_delivery_days: 0.0, late_rate: 0.0 }
    }

    fn from_counts(n_orders: i64, total_delivery_days: i64, late_orders: i64) -> Self {
        if n_orders == 0 {
            return Self::empty();
        }
        let n = n_orders as f64;
        Self {
            n_orders,
            avg_delivery_days: total_delivery_days as f64 / n,
            late_rate: late_orders as f64 / n,
        }
    }

    pub fn from_metrics(metrics: &[DeliveryMetric]) -> Self {
        let total: i64 = metrics.iter().map(|m| m.delivery_days).sum();
        let late = metrics.iter().filter(|m| m.is_late()).count() as i64;
        Self::from_counts(metrics.len() as i64, total, late)
    }
}

#[derive(Debug, Deserialize)]
struct KpiRaw {
    n_orders: i64,
    #[serde(default)]
    total_delivery_days: Option<i64>,
    #[serde(default)]
    late_orders: Option<i64>,
}

/// Aggregate `order_delivery_metrics` in the store. Read-only.
pub async fn load_kpis(db: &DbConn) -> Result<Kpis> {
    let raw: Option<KpiRaw> = db
        .query(format!(
            r#"
            SELECT
                count() AS n_orders,
                math::sum(delivery_days) AS total_delivery_days,
                count(IF delay_vs_estimate_days > 0 THEN 1 END) AS late_orders
            FROM {}
            GROUP ALL
            "#,
            db::ORDER_DELIVERY_METRICS
        ))
        .await?
        .take(0)?;

    Ok(raw
        .map(|r| {
            Kpis::from_counts(
                r.n_orders,
                r.total_delivery_days.unwrap_or(0),
                r.late_orders.unwrap_or(0),
            )
        })
        .unwrap_or_else(Kpis::empty))
}
