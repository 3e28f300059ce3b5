//! Order summaries computed from raw upstream records

use super::window::DayWindow;
use chrono::DateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const LATE_THRESHOLD_MS: i64 = 3600 * 1000;

/// `[price, latitude, longitude]`
pub type PriceCoordinate = (f64, Value, Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateOrder {
    #[serde(rename = "orderId")]
    pub order_id: Value,
    /// Minutes between creation and delivery
    pub late_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledPackage {
    pub reason: Value,
    #[serde(rename = "orderId")]
    pub order_id: Value,
    #[serde(rename = "totalPrice")]
    pub total_price: f64,
}

/// Trendyol packages created within one local day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendyolOrderSummary {
    pub total_order: u64,
    pub store_pickup_order: u64,
    pub total_price: f64,
    pub late_orders: Vec<LateOrder>,
    pub cancelled_orders: Vec<CancelledPackage>,
    pub order_price_coordinate: Vec<PriceCoordinate>,
}

impl TrendyolOrderSummary {
    /// Summarise packages, keeping only those created inside the window.
    pub fn from_packages(packages: &[Value], window: &DayWindow) -> Self {
        let mut summary = Self::default();

        for package in packages {
            let Some(created) = package.get("packageCreationDate").and_then(Value::as_i64) else {
                debug!("Skipping package without creation date");
                continue;
            };
            if !window.contains_ms(created) {
                continue;
            }

            let price = number(package.get("totalPrice"));
            summary.total_order += 1;
            summary.total_price += price;

            if package
                .get("storePickupSelected")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                summary.store_pickup_order += 1;
            }

            let order_id = package.get("orderId").cloned().unwrap_or(Value::Null);
            let status = package.get("packageStatus").and_then(Value::as_str).unwrap_or_default();

            if matches!(status, "Cancelled" | "UnSupplied") {
                summary.cancelled_orders.push(CancelledPackage {
                    reason: package.get("cancelInfo").cloned().unwrap_or(Value::Null),
                    order_id: order_id.clone(),
                    total_price: price,
                });
            }

            if status == "Delivered" {
                if let Some(modified) = package.get("packageModificationDate").and_then(Value::as_i64) {
                    if created < modified - LATE_THRESHOLD_MS {
                        summary.late_orders.push(LateOrder {
                            order_id,
                            late_time: (modified - created) / 60 / 1000,
                        });
                    }
                }
            }

            let address = package.get("address");
            summary.order_price_coordinate.push((
                price,
                field(address, "latitude"),
                field(address, "longitude"),
            ));
        }

        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledOrder {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub price: Value,
}

/// Yemeksepeti orders of one local day, updated incrementally across runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YemeksepetiOrderSummary {
    pub cancelled_orders: Vec<CancelledOrder>,
    pub total_price: f64,
    pub order_price_coordinate: Vec<PriceCoordinate>,
    /// Codes of orders already counted into `total_price`
    pub orders_id: Vec<String>,
}

/// What [`YemeksepetiOrderSummary::apply`] did with an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEffect {
    Counted,
    Cancelled,
    AlreadyCounted,
    OtherDay,
    Unusable,
}

impl YemeksepetiOrderSummary {
    /// Summary stored by an earlier run, if it can be read back
    pub fn from_previous(previous: Option<&Value>) -> Self {
        previous
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.orders_id.is_empty() && self.cancelled_orders.is_empty()
    }

    /// Fold one order detail into the summary. Orders already counted and
    /// orders created on another local day leave it unchanged.
    pub fn apply(&mut self, order: &Value, window: &DayWindow) -> OrderEffect {
        let Some(code) = order.get("code").and_then(code_string) else {
            return OrderEffect::Unusable;
        };
        if self.orders_id.contains(&code) {
            return OrderEffect::AlreadyCounted;
        }

        let Some(created) = order
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        else {
            return OrderEffect::Unusable;
        };
        if created.with_timezone(&window.tz).date_naive() != window.date {
            return OrderEffect::OtherDay;
        }

        let total_net = order
            .get("price")
            .and_then(|price| price.get("totalNet"))
            .cloned()
            .unwrap_or(Value::Null);

        if order.get("status").and_then(Value::as_str) == Some("cancelled") {
            if !self.cancelled_orders.iter().any(|c| c.order_id == code) {
                self.cancelled_orders.push(CancelledOrder {
                    order_id: code,
                    price: total_net,
                });
            }
            return OrderEffect::Cancelled;
        }

        let price = number(Some(&total_net));
        self.total_price += price;

        if let Some(address) = order.get("delivery").and_then(|d| d.get("address")) {
            if address.as_object().is_some_and(|a| !a.is_empty()) {
                self.order_price_coordinate.push((
                    price,
                    field(Some(address), "latitude"),
                    field(Some(address), "longitude"),
                ));
            }
        }

        self.orders_id.push(code);
        OrderEffect::Counted
    }
}

/// Numbers arrive both as JSON numbers and as decimal strings.
fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn field(object: Option<&Value>, key: &str) -> Value {
    object
        .and_then(|o| o.get(key))
        .cloned()
        .unwrap_or(Value::Null)
}

fn code_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn window() -> DayWindow {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        DayWindow::days_back(now, "Europe/Istanbul".parse().unwrap(), 0).unwrap()
    }

    #[test]
    fn test_trendyol_summary() {
        let w = window();
        let inside = w.start_ms() + 3600 * 1000;
        let packages = vec![
            json!({
                "orderId": 1, "packageCreationDate": inside, "packageModificationDate": inside + 90 * 60 * 1000,
                "packageStatus": "Delivered", "totalPrice": 100.5, "storePickupSelected": false,
                "address": {"latitude": "41.0", "longitude": "29.0"}
            }),
            json!({
                "orderId": 2, "packageCreationDate": inside, "packageModificationDate": inside + 1000,
                "packageStatus": "Cancelled", "cancelInfo": {"reason": "closed"}, "totalPrice": 50,
                "storePickupSelected": true, "address": {"latitude": "41.1", "longitude": "29.1"}
            }),
            json!({
                "orderId": 3, "packageCreationDate": w.end_ms(), "packageStatus": "Delivered",
                "totalPrice": 999, "address": {}
            }),
        ];

        let summary = TrendyolOrderSummary::from_packages(&packages, &w);

        assert_eq!(summary.total_order, 2);
        assert_eq!(summary.store_pickup_order, 1);
        assert_eq!(summary.total_price, 150.5);
        assert_eq!(summary.late_orders, vec![LateOrder { order_id: json!(1), late_time: 90 }]);
        assert_eq!(summary.cancelled_orders.len(), 1);
        assert_eq!(summary.cancelled_orders[0].reason, json!({"reason": "closed"}));
        assert_eq!(summary.order_price_coordinate.len(), 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["late_orders"][0]["orderId"], 1);
        assert_eq!(json["order_price_coordinate"][0], json!([100.5, "41.0", "29.0"]));
    }

    fn order(code: &str, created_at: &str, status: &str, total: &str) -> Value {
        json!({
            "code": code, "createdAt": created_at, "status": status,
            "price": {"totalNet": total},
            "delivery": {"address": {"latitude": 41.0, "longitude": 29.0}}
        })
    }

    #[test]
    fn test_yemeksepeti_incremental_apply() {
        let w = window();
        let mut summary = YemeksepetiOrderSummary::from_previous(Some(&json!({
            "cancelled_orders": [],
            "total_price": 10.0,
            "order_price_coordinate": [[10.0, 41.0, 29.0]],
            "orders_id": ["A"]
        })));

        assert_eq!(summary.apply(&order("A", "2024-05-02T08:00:00Z", "accepted", "10"), &w), OrderEffect::AlreadyCounted);
        assert_eq!(summary.apply(&order("B", "2024-05-02T09:00:00Z", "accepted", "25.5"), &w), OrderEffect::Counted);
        assert_eq!(summary.apply(&order("C", "2024-05-02T09:30:00Z", "cancelled", "7"), &w), OrderEffect::Cancelled);
        assert_eq!(summary.apply(&order("C", "2024-05-02T09:30:00Z", "cancelled", "7"), &w), OrderEffect::Cancelled);
        // 22:00 UTC on 2 May is already 3 May in Istanbul
        assert_eq!(summary.apply(&order("D", "2024-05-02T22:00:00Z", "accepted", "5"), &w), OrderEffect::OtherDay);
        assert_eq!(summary.apply(&json!({"status": "accepted"}), &w), OrderEffect::Unusable);

        assert_eq!(summary.total_price, 35.5);
        assert_eq!(summary.orders_id, vec!["A", "B"]);
        assert_eq!(summary.cancelled_orders.len(), 1);
        assert_eq!(summary.order_price_coordinate.len(), 2);
    }

    #[test]
    fn test_unreadable_previous_summary_starts_fresh() {
        let summary = YemeksepetiOrderSummary::from_previous(Some(&json!("garbage")));
        assert!(summary.is_empty());
        assert_eq!(YemeksepetiOrderSummary::from_previous(None), YemeksepetiOrderSummary::default());
    }
}
