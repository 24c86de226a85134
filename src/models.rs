//! Wire types for the bookstore REST API.
//!
//! All of these are server-owned values: the client deserializes them,
//! displays them and hands them back, but never recomputes prices, stock
//! or status locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(alias = "expiresAt")]
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub email: String,
    pub password: String,
}

/// Profile returned by `GET /api/Auth/me`.
///
/// Treated as opaque: fields the client does not know about are kept in
/// `extra` so the whole record can be shown back to the user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "name")]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn display_name(&self) -> &str {
        if self.user_name.is_empty() {
            &self.email
        } else {
            &self.user_name
        }
    }
}

// ============================================================================
// Books
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetails {
    #[serde(flatten)]
    pub summary: BookSummary,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Body for admin create/update of a book.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub title: String,
    pub author: String,
    pub price: f64,
    pub discount_percentage: f64,
    pub stock: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Query parameters for `GET /api/Books`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl BookQuery {
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                params.push(("search".to_string(), search.to_string()));
            }
        }
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.page_size {
            params.push(("pageSize".to_string(), size.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_name: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewInput {
    pub rating: u8,
    pub comment: String,
}

// ============================================================================
// Cart
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CartItem {
    pub id: i64,
    pub book: BookSummary,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub book_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderStatus")]
pub enum OrderStatus {
    Pending,
    Processing,
    Delivered,
    Cancelled,
}

/// Backends emit the status either by name or by enum index.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawOrderStatus {
    Name(String),
    Index(u64),
}

impl TryFrom<RawOrderStatus> for OrderStatus {
    type Error = String;

    fn try_from(raw: RawOrderStatus) -> Result<Self, Self::Error> {
        match raw {
            RawOrderStatus::Name(name) => OrderStatus::from_str(&name)
                .ok_or_else(|| format!("unknown order status '{}'", name)),
            RawOrderStatus::Index(0) => Ok(Self::Pending),
            RawOrderStatus::Index(1) => Ok(Self::Processing),
            RawOrderStatus::Index(2) => Ok(Self::Delivered),
            RawOrderStatus::Index(3) => Ok(Self::Cancelled),
            RawOrderStatus::Index(n) => Err(format!("unknown order status index {}", n)),
        }
    }
}

impl OrderStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "delivered" => Some(Self::Delivered),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub id: i64,
    pub book: BookSummary,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub claim_code: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub discount_applied: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardholder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_cvc: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_status_by_name_or_index() {
        let by_name: OrderStatus = serde_json::from_value(json!("processing")).unwrap();
        assert_eq!(by_name, OrderStatus::Processing);

        let by_index: OrderStatus = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(by_index, OrderStatus::Cancelled);

        assert!(serde_json::from_value::<OrderStatus>(json!("shipped")).is_err());
        assert!(serde_json::from_value::<OrderStatus>(json!(9)).is_err());
    }

    #[test]
    fn test_order_status_serializes_as_name() {
        assert_eq!(
            serde_json::to_value(OrderStatus::Delivered).unwrap(),
            json!("Delivered")
        );
    }

    #[test]
    fn test_user_profile_keeps_unknown_fields() {
        let profile: UserProfile = serde_json::from_value(json!({
            "id": "u-1",
            "userName": "alice",
            "email": "alice@example.com",
            "roles": ["Admin"],
            "loyaltyPoints": 42
        }))
        .unwrap();
        assert!(profile.has_role("admin"));
        assert_eq!(profile.display_name(), "alice");
        assert_eq!(profile.extra.get("loyaltyPoints"), Some(&json!(42)));
    }

    #[test]
    fn test_order_decodes_camel_case() {
        let order: Order = serde_json::from_value(json!({
            "id": 7,
            "claimCode": "ALISH-20240315123456-AB12",
            "status": "Pending",
            "items": [{
                "book": {"id": 1, "title": "Dune", "price": 12.5},
                "quantity": 2,
                "unitPrice": 12.5
            }],
            "totalPrice": 25.0,
            "discountApplied": 0.0
        }))
        .unwrap();
        assert_eq!(order.claim_code, "ALISH-20240315123456-AB12");
        assert_eq!(order.items[0].book.title, "Dune");
        assert_eq!(order.items[0].book.discount_percentage, 0.0);
    }

    #[test]
    fn test_book_query_params() {
        let query = BookQuery {
            search: Some("  tolkien ".to_string()),
            page: Some(2),
            page_size: None,
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("search".to_string(), "tolkien".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        let blank = BookQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.to_params().is_empty());
    }
}
