//! Book browsing, reviews, and admin inventory management.

use crate::api::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::models::{BookDetails, BookInput, BookQuery, BookSummary, Review, ReviewInput};

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub struct Catalog {
    page_size: u32,
}

impl Catalog {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// One page of books, optionally filtered by a search term.
    pub fn list_books(
        &self,
        api: &ApiClient,
        search: Option<&str>,
        page: u32,
    ) -> ApiResult<Vec<BookSummary>> {
        let query = BookQuery {
            search: search.map(str::to_string),
            page: Some(page.max(1)),
            page_size: Some(self.page_size),
        };
        api.list_books(&query)
    }

    pub fn book(&self, api: &ApiClient, id: i64) -> ApiResult<BookDetails> {
        api.get_book(id)
    }

    pub fn reviews(&self, api: &ApiClient, book_id: i64) -> ApiResult<Vec<Review>> {
        api.reviews(book_id)
    }

    pub fn add_review(
        &self,
        api: &ApiClient,
        auth: &str,
        book_id: i64,
        rating: u8,
        comment: &str,
    ) -> ApiResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::InvalidInput(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
        api.add_review(
            auth,
            book_id,
            &ReviewInput {
                rating,
                comment: comment.trim().to_string(),
            },
        )
    }

    // Admin inventory. The server enforces the Admin role.

    pub fn create_book(&self, api: &ApiClient, auth: &str, book: &BookInput) -> ApiResult<BookDetails> {
        check_book(book)?;
        api.create_book(auth, book)
    }

    /// Update, then re-read the book so the caller shows server state.
    pub fn update_book(
        &self,
        api: &ApiClient,
        auth: &str,
        id: i64,
        book: &BookInput,
    ) -> ApiResult<BookDetails> {
        check_book(book)?;
        api.update_book(auth, id, book)?;
        api.get_book(id)
    }

    pub fn delete_book(&self, api: &ApiClient, auth: &str, id: i64) -> ApiResult<()> {
        api.delete_book(auth, id)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

fn check_book(book: &BookInput) -> ApiResult<()> {
    if book.title.trim().is_empty() {
        return Err(ApiError::InvalidInput("title is required".to_string()));
    }
    if !book.price.is_finite() || !book.discount_percentage.is_finite() {
        return Err(ApiError::InvalidInput(
            "price and discount must be numbers".to_string(),
        ));
    }
    if book.price < 0.0 || book.stock < 0 {
        return Err(ApiError::InvalidInput(
            "price and stock cannot be negative".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&book.discount_percentage) {
        return Err(ApiError::InvalidInput(
            "discount must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}
