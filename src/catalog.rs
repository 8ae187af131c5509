//! Storage behind the development backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bookkeep_core::{
    Author, AuthorCreate, Book, BookCreate, BookFilter, Category, CategoryCreate, EmbeddingUpdate,
    Page, PageRequest, RecomputeSummary, ScoredBook,
};

use crate::error::{Error, Result};

pub mod memory;
pub mod similarity;

pub use memory::MemoryCatalog;

/// Catalog trait for bookstore storage backends
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List books with pagination, sorting, and filtering
    async fn list_books(&self, paging: &PageRequest, filter: &BookFilter) -> Result<Page<Book>>;

    /// All books whose title contains `title`, case-insensitive
    async fn search_books(&self, title: &str) -> Result<Vec<Book>>;

    async fn get_book(&self, id: &str) -> Result<Book>;

    /// Create a book; author and category names are copied into the record
    async fn create_book(&self, dto: BookCreate) -> Result<Book>;

    async fn update_book(&self, id: &str, dto: BookCreate) -> Result<Book>;

    async fn delete_book(&self, id: &str) -> Result<()>;

    /// List authors with pagination, optionally by name
    async fn list_authors(&self, paging: &PageRequest, name: Option<&str>) -> Result<Page<Author>>;

    async fn search_authors(&self, name: &str) -> Result<Vec<Author>>;

    async fn get_author(&self, id: &str) -> Result<Author>;

    async fn create_author(&self, dto: AuthorCreate) -> Result<Author>;

    async fn update_author(&self, id: &str, dto: AuthorCreate) -> Result<Author>;

    async fn delete_author(&self, id: &str) -> Result<()>;

    /// All categories sorted by `paging`, optionally by name. Not paginated.
    async fn list_categories(&self, paging: &PageRequest, name: Option<&str>) -> Result<Vec<Category>>;

    async fn search_categories(&self, name: &str) -> Result<Vec<Category>>;

    async fn get_category(&self, id: &str) -> Result<Category>;

    async fn create_category(&self, dto: CategoryCreate) -> Result<Category>;

    async fn update_category(&self, id: &str, dto: CategoryCreate) -> Result<Category>;

    async fn delete_category(&self, id: &str) -> Result<()>;

    /// Books most similar to `book_id`; the book needs an embedding
    async fn recommendations(&self, book_id: &str, size: usize) -> Result<Vec<ScoredBook>>;

    /// Embedded books ranked against the free-text query
    async fn semantic_search(&self, query: &str, size: usize) -> Result<Vec<ScoredBook>>;

    /// Compute embeddings for books lacking one, or for all with `force`
    async fn recompute_embeddings(&self, force: bool) -> Result<RecomputeSummary>;

    async fn update_book_embedding(&self, book_id: &str) -> Result<EmbeddingUpdate>;
}

/// Collects field errors; empty means valid.
#[derive(Debug, Default)]
pub(crate) struct Violations(BTreeMap<String, String>);

impl Violations {
    pub(crate) fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok && !self.0.contains_key(field) {
            self.0.insert(field.to_string(), message.to_string());
        }
    }

    pub(crate) fn into_result(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.0))
        }
    }
}

pub(crate) fn validate_book(dto: &BookCreate) -> Result<()> {
    let mut v = Violations::default();
    let title = dto.title.trim();
    v.check(!title.is_empty(), "title", "Title is required");
    v.check(
        title.chars().count() <= 255,
        "title",
        "Title must be between 1 and 255 characters",
    );
    v.check(!dto.isbn.trim().is_empty(), "isbn", "ISBN is required");
    v.check(
        dto.description.as_ref().map_or(true, |d| d.chars().count() <= 1000),
        "description",
        "Description cannot exceed 1000 characters",
    );
    v.check(dto.price >= 0.01, "price", "Price must be greater than 0");
    v.check(!dto.author_id.trim().is_empty(), "authorId", "Author ID is required");
    v.check(!dto.category_id.trim().is_empty(), "categoryId", "Category ID is required");
    v.into_result()
}

pub(crate) fn validate_author(dto: &AuthorCreate) -> Result<()> {
    let mut v = Violations::default();
    let name = dto.name.trim();
    v.check(!name.is_empty(), "name", "Author name is required");
    v.check(
        (2..=100).contains(&name.chars().count()),
        "name",
        "Author name must be between 2 and 100 characters",
    );
    v.check(
        dto.email.split_once('@').is_some_and(|(user, host)| !user.is_empty() && host.contains('.')),
        "email",
        "Email must be a well-formed email address",
    );
    v.check(
        dto.biography.as_ref().map_or(true, |b| b.chars().count() <= 1000),
        "biography",
        "Bio cannot exceed 1000 characters",
    );
    v.into_result()
}

pub(crate) fn validate_category(dto: &CategoryCreate) -> Result<()> {
    let mut v = Violations::default();
    let name = dto.name.trim();
    v.check(!name.is_empty(), "name", "Category name is required");
    v.check(
        name.chars().count() <= 100,
        "name",
        "Category name cannot exceed 100 characters",
    );
    v.into_result()
}
