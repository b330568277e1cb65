//! Exploration report over the raw tables.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::db::{self, DbConn};
use crate::models::OrderPayment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    pub order_status: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTypeSummary {
    pub payment_type: String,
    pub avg_payment_value: f64,
    pub n_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreReport {
    pub n_customers: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub payments_by_type: Vec<PaymentTypeSummary>,
}

/// Average payment and distinct order count per payment type, highest
/// average first.
pub fn summarize_payments(payments: &[OrderPayment]) -> Vec<PaymentTypeSummary> {
    let mut groups: BTreeMap<&str, (f64, usize, BTreeSet<&str>)> = BTreeMap::new();
    for p in payments {
        let entry = groups.entry(p.payment_type.as_str()).or_default();
        entry.0 += p.payment_value;
        entry.1 += 1;
        entry.2.insert(p.order_id.as_str());
    }

    let mut summary: Vec<PaymentTypeSummary> = groups
        .into_iter()
        .map(|(payment_type, (total, n, orders))| PaymentTypeSummary {
            payment_type: payment_type.to_string(),
            avg_payment_value: total / n as f64,
            n_orders: orders.len(),
        })
        .collect();
    summary.sort_by(|a, b| b.avg_payment_value.total_cmp(&a.avg_payment_value));
    summary
}

pub async fn orders_by_status(db: &DbConn) -> Result<Vec<StatusCount>> {
    let mut rows: Vec<StatusCount> = db
        .query("SELECT order_status, count() AS count FROM orders GROUP BY order_status")
        .await?
        .take(0)?;
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.order_status.cmp(&b.order_status)));
    Ok(rows)
}

pub async fn report(db: &DbConn) -> Result<ExploreReport> {
    let payments: Vec<OrderPayment> = db::load_table(db, db::ORDER_PAYMENTS).await?;
    Ok(ExploreReport {
        n_customers: db::count(db, db::CUSTOMERS).await?,
        orders_by_status: orders_by_status(db).await?,
        payments_by_type: summarize_payments(&payments),
    })
}

impl fmt::Display for ExploreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Customers: {}", self.n_customers)?;

        writeln!(f, "\nOrders by status")?;
        writeln!(f, "{}", "─".repeat(40))?;
        for s in &self.orders_by_status {
            writeln!(f, "  {:<20} {:>10}", s.order_status, s.count)?;
        }

        writeln!(f, "\nPayments by type")?;
        writeln!(f, "{}", "─".repeat(50))?;
        writeln!(f, "  {:<20} {:>12} {:>12}", "type", "avg value", "orders")?;
        for p in &self.payments_by_type {
            writeln!(
                f,
                "  {:<20} {:>12.2} {:>12}",
                p.payment_type, p.avg_payment_value, p.n_orders
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(order_id: &str, seq: u32, kind: &str, value: f64) -> OrderPayment {
        OrderPayment {
            order_id: order_id.into(),
            payment_sequential: seq,
            payment_type: kind.into(),
            payment_installments: 1,
            payment_value: value,
        }
    }

    #[test]
    fn test_summarize_payments() {
        let payments = vec![
            payment("o1", 1, "credit_card", 100.0),
            payment("o1", 2, "credit_card", 50.0),
            payment("o2", 1, "credit_card", 30.0),
            payment("o2", 2, "voucher", 200.0),
        ];
        let summary = summarize_payments(&payments);
        assert_eq!(summary[0].payment_type, "voucher");
        assert_eq!(summary[1].payment_type, "credit_card");
        assert_eq!(summary[1].n_orders, 2);
        assert!((summary[1].avg_payment_value - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_orders_by_status_sorted() {
        let db = db::connect_in_memory().await.unwrap();
        db::init_schema(&db).await.unwrap();

        #[derive(Clone, Serialize)]
        struct Row {
            order_id: String,
            order_status: String,
        }
        let rows: Vec<Row> = [("a", "shipped"), ("b", "delivered"), ("c", "delivered")]
            .iter()
            .map(|(id, s)| Row { order_id: id.to_string(), order_status: s.to_string() })
            .collect();
        db::replace_table(&db, db::ORDERS, &rows).await.unwrap();

        let statuses = orders_by_status(&db).await.unwrap();
        assert_eq!(statuses[0], StatusCount { order_status: "delivered".into(), count: 2 });
        assert_eq!(statuses[1].count, 1);
    }
}
