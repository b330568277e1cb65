use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp layout used throughout the raw Olist exports.
pub const RAW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_timestamp(value: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), RAW_TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp '{}'", value))
}

/// Empty cells mean "not recorded".
fn parse_optional_timestamp(value: &Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_timestamp(v).map(Some),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ============================================================================
// Raw CSV records
// ============================================================================

/// Raw record from olist_orders_dataset.csv
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCsvRecord {
    pub order_id: String,
    pub customer_id: String,
    pub order_status: String,
    pub order_purchase_timestamp: String,
    pub order_approved_at: Option<String>,
    pub order_delivered_carrier_date: Option<String>,
    pub order_delivered_customer_date: Option<String>,
    pub order_estimated_delivery_date: Option<String>,
}

impl OrderCsvRecord {
    pub fn to_order(&self) -> anyhow::Result<Order> {
        Ok(Order {
            order_id: self.order_id.clone(),
            customer_id: self.customer_id.clone(),
            order_status: self.order_status.clone(),
            purchase_ts: parse_timestamp(&self.order_purchase_timestamp)?,
            approved_at: parse_optional_timestamp(&self.order_approved_at)?,
            delivered_carrier_at: parse_optional_timestamp(&self.order_delivered_carrier_date)?,
            delivered_customer_at: parse_optional_timestamp(&self.order_delivered_customer_date)?,
            estimated_delivery_at: parse_optional_timestamp(&self.order_estimated_delivery_date)?,
        })
    }
}

/// Raw record from olist_order_items_dataset.csv
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemCsvRecord {
    pub order_id: String,
    pub order_item_id: u32,
    pub product_id: String,
    pub seller_id: String,
    pub shipping_limit_date: Option<String>,
    pub price: f64,
    pub freight_value: f64,
}

impl OrderItemCsvRecord {
    pub fn to_order_item(&self) -> anyhow::Result<OrderItem> {
        Ok(OrderItem {
            order_id: self.order_id.clone(),
            order_item_id: self.order_item_id,
            product_id: self.product_id.clone(),
            seller_id: self.seller_id.clone(),
            shipping_limit_at: parse_optional_timestamp(&self.shipping_limit_date)?,
            price: self.price,
            freight_value: self.freight_value,
        })
    }
}

/// Raw record from olist_order_reviews_dataset.csv
#[derive(Debug, Clone, Deserialize)]
pub struct OrderReviewCsvRecord {
    pub review_id: String,
    pub order_id: String,
    pub review_score: u8,
    pub review_comment_title: Option<String>,
    pub review_comment_message: Option<String>,
    pub review_creation_date: Option<String>,
    pub review_answer_timestamp: Option<String>,
}

impl OrderReviewCsvRecord {
    pub fn to_review(&self) -> anyhow::Result<OrderReview> {
        Ok(OrderReview {
            review_id: self.review_id.clone(),
            order_id: self.order_id.clone(),
            review_score: self.review_score,
            review_comment_title: non_empty(&self.review_comment_title),
            review_comment_message: non_empty(&self.review_comment_message),
            review_created_at: parse_optional_timestamp(&self.review_creation_date)?,
            review_answered_at: parse_optional_timestamp(&self.review_answer_timestamp)?,
        })
    }
}

/// Raw record from olist_products_dataset.csv (dimension columns only)
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCsvRecord {
    pub product_id: String,
    pub product_category_name: Option<String>,
}

impl ProductCsvRecord {
    pub fn to_product(&self) -> Product {
        Product {
            product_id: self.product_id.clone(),
            product_category_name: non_empty(&self.product_category_name),
        }
    }
}

// ============================================================================
// Store entities
// ============================================================================

/// Order header. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub order_status: String,
    pub purchase_ts: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub delivered_carrier_at: Option<NaiveDateTime>,
    pub delivered_customer_at: Option<NaiveDateTime>,
    pub estimated_delivery_at: Option<NaiveDateTime>,
}

/// One line of an order. Each item becomes its own training row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: String,
    pub order_item_id: u32,
    pub product_id: String,
    pub seller_id: String,
    pub shipping_limit_at: Option<NaiveDateTime>,
    pub price: f64,
    pub freight_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub customer_unique_id: String,
    pub customer_zip_code_prefix: String,
    pub customer_city: String,
    pub customer_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub seller_id: String,
    pub seller_zip_code_prefix: String,
    pub seller_city: String,
    pub seller_state: String,
}

/// Product dimension. The category is free text and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub product_category_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPayment {
    pub order_id: String,
    pub payment_sequential: u32,
    pub payment_type: String,
    pub payment_installments: u32,
    pub payment_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReview {
    pub review_id: String,
    pub order_id: String,
    pub review_score: u8,
    pub review_comment_title: Option<String>,
    pub review_comment_message: Option<String>,
    pub review_created_at: Option<NaiveDateTime>,
    pub review_answered_at: Option<NaiveDateTime>,
}

// ============================================================================
// Derived tables
// ============================================================================

/// Per-order delivery timing, only for orders with complete delivery data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMetric {
    pub order_id: String,
    pub customer_id: String,
    pub delivery_days: i64,
    pub estimated_delivery_days: i64,
    pub delay_vs_estimate_days: i64,
    pub purchase_ts: NaiveDateTime,
}

impl DeliveryMetric {
    /// Late means strictly later than the estimate; arriving on the estimated day is on time.
    pub fn is_late(&self) -> bool {
        self.delay_vs_estimate_days > 0
    }
}

/// One (order, item) row of the model-ready dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub order_id: String,
    pub customer_unique_id: String,
    pub customer_state: String,
    pub seller_state: String,
    pub product_category_name: Option<String>,
    pub price: f64,
    pub freight_value: f64,
    pub delivery_days: i64,
    pub estimated_delivery_days: i64,
    pub is_late: bool,
    pub purchase_date: NaiveDate,
    pub purchase_dow: u32,
    pub purchase_month: u32,
    pub purchase_year: i32,
}

impl FeatureRow {
    /// The model-facing attributes. Identifiers and `delivery_days` are not included.
    pub fn features(&self) -> OrderFeatures {
        OrderFeatures {
            customer_state: Some(self.customer_state.clone()),
            seller_state: Some(self.seller_state.clone()),
            product_category_name: self.product_category_name.clone(),
            price: self.price,
            freight_value: self.freight_value,
            estimated_delivery_days: self.estimated_delivery_days as f64,
            purchase_dow: self.purchase_dow as i32,
            purchase_month: self.purchase_month as i32,
            purchase_year: self.purchase_year,
        }
    }
}

/// Attribute set shared by training rows and prediction requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFeatures {
    #[serde(default)]
    pub customer_state: Option<String>,
    #[serde(default)]
    pub seller_state: Option<String>,
    #[serde(default)]
    pub product_category_name: Option<String>,
    pub price: f64,
    pub freight_value: f64,
    pub estimated_delivery_days: f64,
    pub purchase_dow: i32,
    pub purchase_month: i32,
    pub purchase_year: i32,
}

impl OrderFeatures {
    pub const NUMERIC_COLUMNS: [&'static str; 6] = [
        "price",
        "freight_value",
        "estimated_delivery_days",
        "purchase_dow",
        "purchase_month",
        "purchase_year",
    ];

    pub const CATEGORICAL_COLUMNS: [&'static str; 3] =
        ["customer_state", "seller_state", "product_category_name"];

    pub fn numeric_values(&self) -> [f64; 6] {
        [
            self.price,
            self.freight_value,
            self.estimated_delivery_days,
            self.purchase_dow as f64,
            self.purchase_month as f64,
            self.purchase_year as f64,
        ]
    }

    pub fn categorical_values(&self) -> [Option<&str>; 3] {
        [
            self.customer_state.as_deref(),
            self.seller_state.as_deref(),
            self.product_category_name.as_deref(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_record() -> OrderCsvRecord {
        OrderCsvRecord {
            order_id: "e481f51cbdc54678b7cc49136f2d6af7".into(),
            customer_id: "9ef432eb6251297304e76186b10a928d".into(),
            order_status: "delivered".into(),
            order_purchase_timestamp: "2017-10-02 10:56:33".into(),
            order_approved_at: Some("2017-10-02 11:07:15".into()),
            order_delivered_carrier_date: Some("2017-10-04 19:55:00".into()),
            order_delivered_customer_date: Some("2017-10-10 21:25:13".into()),
            order_estimated_delivery_date: Some("2017-10-18 00:00:00".into()),
        }
    }

    #[test]
    fn test_order_record_parses_timestamps() {
        let order = order_record().to_order().unwrap();
        assert_eq!(order.purchase_ts.to_string(), "2017-10-02 10:56:33");
        assert!(order.delivered_customer_at.is_some());
    }

    #[test]
    fn test_empty_timestamp_is_absent() {
        let mut record = order_record();
        record.order_delivered_customer_date = Some(String::new());
        let order = record.to_order().unwrap();
        assert_eq!(order.delivered_customer_at, None);
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        let mut record = order_record();
        record.order_purchase_timestamp = "02/10/2017".into();
        assert!(record.to_order().is_err());
    }

    #[test]
    fn test_blank_category_is_absent() {
        let product = ProductCsvRecord {
            product_id: "p1".into(),
            product_category_name: Some("  ".into()),
        }
        .to_product();
        assert_eq!(product.product_category_name, None);
    }
}
