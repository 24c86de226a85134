//! Cart state holder.
//!
//! Every mutation is a server call followed by a full refetch; the local
//! cart is only ever replaced by what `GET /api/Cart` returns. On failure
//! the previous cart is kept as-is.

use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{Cart, CartItem};

#[derive(Debug, Default)]
pub struct CartStore {
    cart: Option<Cart>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the local cart with the server's.
    pub fn fetch_cart(&mut self, api: &ApiClient, auth: &str) -> ApiResult<&Cart> {
        let cart = api.get_cart(auth)?;
        tracing::debug!(items = cart.items.len(), "cart refreshed");
        Ok(self.cart.insert(cart))
    }

    pub fn add_item(
        &mut self,
        api: &ApiClient,
        auth: &str,
        book_id: i64,
        quantity: u32,
    ) -> ApiResult<&Cart> {
        check_quantity(quantity)?;
        api.add_cart_item(auth, book_id, quantity)?;
        self.fetch_cart(api, auth)
    }

    pub fn update_item_quantity(
        &mut self,
        api: &ApiClient,
        auth: &str,
        item_id: i64,
        quantity: u32,
    ) -> ApiResult<&Cart> {
        check_quantity(quantity)?;
        api.update_cart_item(auth, item_id, quantity)?;
        self.fetch_cart(api, auth)
    }

    pub fn remove_item(&mut self, api: &ApiClient, auth: &str, item_id: i64) -> ApiResult<&Cart> {
        api.remove_cart_item(auth, item_id)?;
        self.fetch_cart(api, auth)
    }

    pub fn clear_cart(&mut self, api: &ApiClient, auth: &str) -> ApiResult<&Cart> {
        api.clear_cart(auth)?;
        self.fetch_cart(api, auth)
    }

    /// Forget the local copy without telling the server (logout).
    pub fn reset(&mut self) {
        self.cart = None;
    }

    /// Last cart received from the server, if any.
    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    pub fn items(&self) -> &[CartItem] {
        self.cart.as_ref().map(|c| c.items.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Total number of copies across all lines.
    pub fn item_count(&self) -> u32 {
        self.items().iter().map(|i| i.quantity).sum()
    }

    #[cfg(test)]
    pub fn find_by_book(&self, book_id: i64) -> Option<&CartItem> {
        self.items().iter().find(|i| i.book.id == book_id)
    }
}

fn check_quantity(quantity: u32) -> ApiResult<()> {
    if quantity == 0 {
        Err(ApiError::InvalidInput(
            "quantity must be at least 1".to_string(),
        ))
    } else {
        Ok(())
    }
}
