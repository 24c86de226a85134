use super::transport::{ApiRequest, Method, Transport};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AddCartItemRequest, BookDetails, BookInput, BookQuery, BookSummary, Cart, LoginRequest,
    LoginResponse, Order, PlaceOrderRequest, RegisterRequest, Review, ReviewInput,
    UpdateCartItemRequest, UserProfile,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Typed wrapper over the bookstore REST API.
///
/// Stateless: credentials are passed per call as the full `Authorization`
/// header value obtained from the session holder.
pub struct ApiClient {
    transport: Box<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    fn execute(&self, request: ApiRequest) -> ApiResult<String> {
        let resp = self.transport.send(&request)?;
        if resp.is_success() {
            Ok(resp.body)
        } else {
            let err = ApiError::from_status(resp.status, &resp.body);
            tracing::info!(
                method = request.method.as_str(),
                path = %request.path,
                status = resp.status,
                "request rejected: {}",
                err
            );
            Err(err)
        }
    }

    fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let path = request.path.clone();
        let body = self.execute(request)?;
        // Some endpoints answer 204 for "nothing here"; treat it as JSON null.
        let text = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(text).map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
    }

    fn discard(&self, request: ApiRequest) -> ApiResult<()> {
        self.execute(request).map(|_| ())
    }

    fn body<T: Serialize>(value: &T) -> ApiResult<Value> {
        serde_json::to_value(value).map_err(|e| ApiError::InvalidInput(e.to_string()))
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    pub fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let body = Self::body(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })?;
        self.fetch(ApiRequest::new(Method::Post, "/api/Auth/login").json(body))
    }

    pub fn register(&self, request: &RegisterRequest) -> ApiResult<()> {
        let body = Self::body(request)?;
        self.discard(ApiRequest::new(Method::Post, "/api/Auth/register").json(body))
    }

    pub fn me(&self, auth: &str) -> ApiResult<UserProfile> {
        self.fetch(ApiRequest::new(Method::Get, "/api/Auth/me").auth(Some(auth)))
    }

    // ------------------------------------------------------------------
    // Books
    // ------------------------------------------------------------------

    pub fn list_books(&self, query: &BookQuery) -> ApiResult<Vec<BookSummary>> {
        let books: Option<Vec<BookSummary>> =
            self.fetch(ApiRequest::new(Method::Get, "/api/Books").query(query.to_params()))?;
        Ok(books.unwrap_or_default())
    }

    pub fn get_book(&self, id: i64) -> ApiResult<BookDetails> {
        self.fetch(ApiRequest::new(Method::Get, format!("/api/Books/{}", id)))
    }

    pub fn create_book(&self, auth: &str, book: &BookInput) -> ApiResult<BookDetails> {
        let body = Self::body(book)?;
        self.fetch(
            ApiRequest::new(Method::Post, "/api/Books")
                .auth(Some(auth))
                .json(body),
        )
    }

    pub fn update_book(&self, auth: &str, id: i64, book: &BookInput) -> ApiResult<()> {
        let body = Self::body(book)?;
        self.discard(
            ApiRequest::new(Method::Put, format!("/api/Books/{}", id))
                .auth(Some(auth))
                .json(body),
        )
    }

    pub fn delete_book(&self, auth: &str, id: i64) -> ApiResult<()> {
        self.discard(ApiRequest::new(Method::Delete, format!("/api/Books/{}", id)).auth(Some(auth)))
    }

    pub fn reviews(&self, book_id: i64) -> ApiResult<Vec<Review>> {
        let reviews: Option<Vec<Review>> = self.fetch(ApiRequest::new(
            Method::Get,
            format!("/api/Books/{}/reviews", book_id),
        ))?;
        Ok(reviews.unwrap_or_default())
    }

    pub fn add_review(&self, auth: &str, book_id: i64, review: &ReviewInput) -> ApiResult<()> {
        let body = Self::body(review)?;
        self.discard(
            ApiRequest::new(Method::Post, format!("/api/Books/{}/reviews", book_id))
                .auth(Some(auth))
                .json(body),
        )
    }

    // ------------------------------------------------------------------
    // Cart
    // ------------------------------------------------------------------

    pub fn get_cart(&self, auth: &str) -> ApiResult<Cart> {
        let cart: Option<Cart> = self.fetch(ApiRequest::new(Method::Get, "/api/Cart").auth(Some(auth)))?;
        Ok(cart.unwrap_or_default())
    }

    pub fn add_cart_item(&self, auth: &str, book_id: i64, quantity: u32) -> ApiResult<()> {
        let body = Self::body(&AddCartItemRequest { book_id, quantity })?;
        self.discard(
            ApiRequest::new(Method::Post, "/api/Cart/items")
                .auth(Some(auth))
                .json(body),
        )
    }

    pub fn update_cart_item(&self, auth: &str, item_id: i64, quantity: u32) -> ApiResult<()> {
        let body = Self::body(&UpdateCartItemRequest { quantity })?;
        self.discard(
            ApiRequest::new(Method::Put, format!("/api/Cart/items/{}", item_id))
                .auth(Some(auth))
                .json(body),
        )
    }

    pub fn remove_cart_item(&self, auth: &str, item_id: i64) -> ApiResult<()> {
        self.discard(
            ApiRequest::new(Method::Delete, format!("/api/Cart/items/{}", item_id)).auth(Some(auth)),
        )
    }

    pub fn clear_cart(&self, auth: &str) -> ApiResult<()> {
        self.discard(ApiRequest::new(Method::Delete, "/api/Cart").auth(Some(auth)))
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    pub fn place_order(&self, auth: &str, request: &PlaceOrderRequest) -> ApiResult<Order> {
        let body = Self::body(request)?;
        self.fetch(
            ApiRequest::new(Method::Post, "/api/Orders")
                .auth(Some(auth))
                .json(body),
        )
    }

    pub fn list_orders(&self, auth: &str) -> ApiResult<Vec<Order>> {
        let orders: Option<Vec<Order>> =
            self.fetch(ApiRequest::new(Method::Get, "/api/Orders").auth(Some(auth)))?;
        Ok(orders.unwrap_or_default())
    }

    pub fn get_order(&self, auth: &str, id: i64) -> ApiResult<Order> {
        self.fetch(ApiRequest::new(Method::Get, format!("/api/Orders/{}", id)).auth(Some(auth)))
    }

    /// `POST /api/Orders/{id}/{action}`; the response body is ignored.
    pub fn order_action(&self, auth: &str, id: i64, action: &str) -> ApiResult<()> {
        self.discard(
            ApiRequest::new(Method::Post, format!("/api/Orders/{}/{}", id, action))
                .auth(Some(auth)),
        )
    }

    pub fn order_by_claim_code(&self, code: &str) -> ApiResult<Order> {
        self.fetch(ApiRequest::new(
            Method::Get,
            format!("/api/Orders/claim/{}", encode_segment(code)),
        ))
    }
}

/// Percent-encode a single path segment.
fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
