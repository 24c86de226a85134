//! Order tracking and admin status transitions.
//!
//! The client never decides whether a transition is legal. It asks the
//! server, then re-reads the order and shows whatever status comes back.

use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::Order;

/// Admin-requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Process,
    Deliver,
    Cancel,
}

impl OrderAction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "process" => Some(Self::Process),
            "deliver" => Some(Self::Deliver),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Trailing path segment of the endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
        }
    }
}

pub struct OrderTracker;

impl OrderTracker {
    /// Look up an order by claim code. Works without a session.
    pub fn track(api: &ApiClient, claim_code: &str) -> ApiResult<Order> {
        let code = normalize_claim_code(claim_code)?;
        api.order_by_claim_code(&code)
    }

    pub fn my_orders(api: &ApiClient, auth: &str) -> ApiResult<Vec<Order>> {
        api.list_orders(auth)
    }

    pub fn order(api: &ApiClient, auth: &str, id: i64) -> ApiResult<Order> {
        api.get_order(auth, id)
    }

    /// Request a transition, then return the order as the server now has it.
    pub fn transition(api: &ApiClient, auth: &str, id: i64, action: OrderAction) -> ApiResult<Order> {
        api.order_action(auth, id, action.as_str())?;
        let order = api.get_order(auth, id)?;
        tracing::info!(order_id = id, action = action.as_str(), status = %order.status, "order updated");
        Ok(order)
    }
}

/// Claim codes are compared verbatim by the server; only surrounding
/// whitespace is dropped.
pub fn normalize_claim_code(code: &str) -> ApiResult<String> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ApiError::InvalidInput("claim code is required".to_string()));
    }
    Ok(code.to_string())
}
