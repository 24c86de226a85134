//! In-process fake of the bookstore backend used by the store tests.
//!
//! Implements [`Transport`] so an [`ApiClient`] can talk to it exactly as it
//! talks to the real server. The fake keeps its own authoritative state and
//! enforces the rules the real backend enforces (stock limits, status
//! transitions, admin-only routes) so client code can be tested against
//! server rejections.

use crate::api::transport::{ApiRequest, ApiResponse, Method, Transport};
use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{BookSummary, Cart, CartItem, Order, OrderItem, OrderStatus, Review, UserProfile};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "hunter2";
pub const TOKEN: &str = "tok-alice";

pub struct FakeState {
    pub token: String,
    pub profile: UserProfile,
    pub profile_fails: bool,
    pub cart_clear_fails: bool,
    pub books: Vec<BookSummary>,
    pub cart: Vec<CartItem>,
    pub orders: Vec<Order>,
    pub reviews: Vec<(i64, Review)>,
    pub next_id: i64,
    pub next_claim_code: Option<String>,
    pub fail_next: Option<(u16, String)>,
    pub unreachable: bool,
    pub requests: Vec<(Method, String)>,
}

#[derive(Clone)]
pub struct FakeBookstore {
    pub state: Rc<RefCell<FakeState>>,
}

pub fn book(id: i64, title: &str, price: f64, stock: i64) -> BookSummary {
    BookSummary {
        id,
        title: title.to_string(),
        author: "Anon".to_string(),
        price,
        discount_percentage: 0.0,
        stock,
        images: Vec::new(),
    }
}

impl FakeBookstore {
    pub fn new() -> Self {
        let profile = UserProfile {
            id: "u-1".to_string(),
            user_name: "alice".to_string(),
            email: EMAIL.to_string(),
            roles: vec!["Customer".to_string()],
            extra: Default::default(),
        };
        let state = FakeState {
            token: TOKEN.to_string(),
            profile,
            profile_fails: false,
            cart_clear_fails: false,
            books: vec![
                book(1, "Dune", 12.5, 10),
                book(2, "Emma", 7.0, 3),
                book(3, "Ulysses", 15.0, 1),
            ],
            cart: Vec::new(),
            orders: Vec::new(),
            reviews: Vec::new(),
            next_id: 100,
            next_claim_code: None,
            fail_next: None,
            unreachable: false,
            requests: Vec::new(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(Box::new(self.clone()))
    }

    pub fn auth_header() -> String {
        format!("Bearer {}", TOKEN)
    }

    pub fn make_admin(&self) {
        self.state.borrow_mut().profile.roles = vec!["Admin".to_string()];
    }

    pub fn fail_next(&self, status: u16, message: &str) {
        self.state.borrow_mut().fail_next = Some((status, message.to_string()));
    }

    pub fn server_cart(&self) -> Cart {
        Cart {
            items: self.state.borrow().cart.clone(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.state.borrow().requests.len()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.borrow().requests.clone()
    }
}

fn respond(status: u16, body: Value) -> Result<ApiResponse, ApiError> {
    let body = if body.is_null() {
        String::new()
    } else {
        body.to_string()
    };
    Ok(ApiResponse { status, body })
}

fn error(status: u16, message: &str) -> Result<ApiResponse, ApiError> {
    respond(status, json!({ "message": message }))
}

fn field_i64(body: &Option<Value>, key: &str) -> Option<i64> {
    body.as_ref().and_then(|b| b.get(key)).and_then(|v| v.as_i64())
}

fn field_str(body: &Option<Value>, key: &str) -> Option<String> {
    body.as_ref()
        .and_then(|b| b.get(key))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

impl Transport for FakeBookstore {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut state = self.state.borrow_mut();
        state
            .requests
            .push((request.method, request.path.clone()));

        if state.unreachable {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        if let Some((status, message)) = state.fail_next.take() {
            return error(status, &message);
        }

        let path = request.path.trim_start_matches("/api/");
        let segments: Vec<&str> = path.split('/').collect();
        let authed = request.authorization.as_deref() == Some(format!("Bearer {}", state.token).as_str());
        let admin = authed && state.profile.has_role("Admin");
        let body = &request.body;

        match (request.method, segments.as_slice()) {
            (Method::Post, ["Auth", "login"]) => {
                if field_str(body, "email").as_deref() == Some(EMAIL)
                    && field_str(body, "password").as_deref() == Some(PASSWORD)
                {
                    respond(
                        200,
                        json!({
                            "token": state.token,
                            "expiration": (Utc::now() + Duration::hours(1)).to_rfc3339(),
                        }),
                    )
                } else {
                    error(401, "Invalid email or password")
                }
            }
            (Method::Post, ["Auth", "register"]) => {
                if field_str(body, "email").as_deref() == Some(EMAIL) {
                    error(400, "Email already registered")
                } else {
                    respond(200, Value::Null)
                }
            }
            (Method::Get, ["Auth", "me"]) => {
                if !authed {
                    return error(401, "");
                }
                if state.profile_fails {
                    return error(500, "Profile service unavailable");
                }
                respond(200, serde_json::to_value(&state.profile).unwrap())
            }

            (Method::Get, ["Books"]) => {
                let search = request
                    .query
                    .iter()
                    .find(|(k, _)| k == "search")
                    .map(|(_, v)| v.to_lowercase());
                let books: Vec<&BookSummary> = state
                    .books
                    .iter()
                    .filter(|b| match &search {
                        Some(s) => b.title.to_lowercase().contains(s),
                        None => true,
                    })
                    .collect();
                respond(200, json!(books))
            }
            (Method::Get, ["Books", id]) => {
                let id: i64 = id.parse().unwrap_or(-1);
                match state.books.iter().find(|b| b.id == id) {
                    Some(b) => {
                        let mut v = serde_json::to_value(b).unwrap();
                        v["description"] = json!(format!("All about {}", b.title));
                        respond(200, v)
                    }
                    None => error(404, "Book not found"),
                }
            }
            (Method::Post, ["Books"]) => {
                if !admin {
                    return error(403, "Admin role required");
                }
                let id = state.next_id;
                state.next_id += 1;
                let mut created = book(
                    id,
                    &field_str(body, "title").unwrap_or_default(),
                    body.as_ref()
                        .and_then(|b| b.get("price"))
                        .and_then(|v| v.as_f64())
                        .unwrap_or(0.0),
                    field_i64(body, "stock").unwrap_or(0),
                );
                created.author = field_str(body, "author").unwrap_or_default();
                state.books.push(created.clone());
                respond(201, serde_json::to_value(&created).unwrap())
            }
            (Method::Put, ["Books", id]) => {
                if !admin {
                    return error(403, "Admin role required");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                let title = field_str(body, "title").unwrap_or_default();
                let stock = field_i64(body, "stock").unwrap_or(0);
                match state.books.iter_mut().find(|b| b.id == id) {
                    Some(b) => {
                        b.title = title;
                        b.stock = stock;
                        respond(204, Value::Null)
                    }
                    None => error(404, "Book not found"),
                }
            }
            (Method::Delete, ["Books", id]) => {
                if !admin {
                    return error(403, "Admin role required");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                let before = state.books.len();
                state.books.retain(|b| b.id != id);
                if state.books.len() == before {
                    error(404, "Book not found")
                } else {
                    respond(204, Value::Null)
                }
            }
            (Method::Get, ["Books", id, "reviews"]) => {
                let id: i64 = id.parse().unwrap_or(-1);
                let reviews: Vec<&Review> = state
                    .reviews
                    .iter()
                    .filter(|(book_id, _)| *book_id == id)
                    .map(|(_, r)| r)
                    .collect();
                respond(200, json!(reviews))
            }
            (Method::Post, ["Books", id, "reviews"]) => {
                if !authed {
                    return error(401, "");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                let review = Review {
                    id: state.next_id,
                    user_name: state.profile.user_name.clone(),
                    rating: field_i64(body, "rating").unwrap_or(0) as u8,
                    comment: field_str(body, "comment").unwrap_or_default(),
                    created_at: Some(Utc::now()),
                };
                state.next_id += 1;
                state.reviews.push((id, review));
                respond(201, Value::Null)
            }

            (Method::Get, ["Cart"]) => {
                if !authed {
                    return error(401, "");
                }
                respond(200, json!({ "items": state.cart }))
            }
            (Method::Post, ["Cart", "items"]) => {
                if !authed {
                    return error(401, "");
                }
                let book_id = field_i64(body, "bookId").unwrap_or(-1);
                let quantity = field_i64(body, "quantity").unwrap_or(0) as u32;
                let book = match state.books.iter().find(|b| b.id == book_id) {
                    Some(b) => b.clone(),
                    None => return error(404, "Book not found"),
                };
                let existing = state
                    .cart
                    .iter()
                    .find(|i| i.book.id == book_id)
                    .map(|i| i.quantity)
                    .unwrap_or(0);
                if (existing + quantity) as i64 > book.stock {
                    return error(400, &format!("Only {} left in stock", book.stock));
                }
                if let Some(item) = state.cart.iter_mut().find(|i| i.book.id == book_id) {
                    item.quantity += quantity;
                } else {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.cart.push(CartItem { id, book, quantity });
                }
                respond(201, Value::Null)
            }
            (Method::Put, ["Cart", "items", id]) => {
                if !authed {
                    return error(401, "");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                let quantity = field_i64(body, "quantity").unwrap_or(0) as u32;
                match state.cart.iter_mut().find(|i| i.id == id) {
                    Some(item) if quantity as i64 > item.book.stock => {
                        let stock = item.book.stock;
                        error(400, &format!("Only {} left in stock", stock))
                    }
                    Some(item) => {
                        item.quantity = quantity;
                        respond(204, Value::Null)
                    }
                    None => error(404, "Cart item not found"),
                }
            }
            (Method::Delete, ["Cart", "items", id]) => {
                if !authed {
                    return error(401, "");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                let before = state.cart.len();
                state.cart.retain(|i| i.id != id);
                if state.cart.len() == before {
                    error(404, "Cart item not found")
                } else {
                    respond(204, Value::Null)
                }
            }
            (Method::Delete, ["Cart"]) => {
                if !authed {
                    return error(401, "");
                }
                if state.cart_clear_fails {
                    return error(500, "Cart service unavailable");
                }
                state.cart.clear();
                respond(204, Value::Null)
            }

            (Method::Post, ["Orders"]) => {
                if !authed {
                    return error(401, "");
                }
                if state.cart.is_empty() {
                    return error(400, "Cart is empty");
                }
                if field_str(body, "paymentMethod").is_none() {
                    return error(400, "Payment method required");
                }
                let id = state.next_id;
                state.next_id += 1;
                let claim_code = state
                    .next_claim_code
                    .take()
                    .unwrap_or_else(|| format!("ALISH-20240315123456-{:04}", id));
                let items: Vec<OrderItem> = state
                    .cart
                    .iter()
                    .map(|i| OrderItem {
                        id: i.id,
                        book: i.book.clone(),
                        quantity: i.quantity,
                        unit_price: i.book.price,
                    })
                    .collect();
                let total = items
                    .iter()
                    .map(|i| i.unit_price * i.quantity as f64)
                    .sum();
                let order = Order {
                    id,
                    claim_code,
                    status: OrderStatus::Pending,
                    items,
                    total_price: total,
                    discount_applied: 0.0,
                    created_at: Some(Utc::now()),
                };
                state.orders.push(order.clone());
                respond(201, serde_json::to_value(&order).unwrap())
            }
            (Method::Get, ["Orders"]) => {
                if !authed {
                    return error(401, "");
                }
                respond(200, json!(state.orders))
            }
            (Method::Get, ["Orders", "claim", code]) => {
                match state.orders.iter().find(|o| o.claim_code == *code) {
                    Some(order) => respond(200, serde_json::to_value(order).unwrap()),
                    None => error(404, "No order with that claim code"),
                }
            }
            (Method::Get, ["Orders", id]) => {
                if !authed {
                    return error(401, "");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                match state.orders.iter().find(|o| o.id == id) {
                    Some(order) => respond(200, serde_json::to_value(order).unwrap()),
                    None => error(404, "Order not found"),
                }
            }
            (Method::Post, ["Orders", id, action]) => {
                if !admin {
                    return error(403, "Admin role required");
                }
                let id: i64 = id.parse().unwrap_or(-1);
                let action = action.to_string();
                let order = match state.orders.iter_mut().find(|o| o.id == id) {
                    Some(o) => o,
                    None => return error(404, "Order not found"),
                };
                let next = match (action.as_str(), order.status) {
                    ("process", OrderStatus::Pending) => OrderStatus::Processing,
                    ("deliver", OrderStatus::Processing) => OrderStatus::Delivered,
                    ("cancel", OrderStatus::Pending | OrderStatus::Processing) => {
                        OrderStatus::Cancelled
                    }
                    (_, status) => {
                        return error(
                            400,
                            &format!("Cannot {} an order that is {}", action, status),
                        )
                    }
                };
                order.status = next;
                respond(204, Value::Null)
            }

            _ => error(404, "No such route"),
        }
    }
}
