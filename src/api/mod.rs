//! REST access to the bookstore backend.

pub mod client;
pub mod transport;

pub use client::ApiClient;
pub use transport::HttpTransport;
