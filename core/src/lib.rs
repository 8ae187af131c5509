//! Core types for the bookkeep bookstore inventory client.
//!
//! This crate provides the shared data types used by both the bookkeep
//! client stack and the development backend that serves the REST API.
//!
//! # Overview
//!
//! The main types are:
//!
//! - [`Book`], [`Author`], [`Category`] - Server-managed resources
//! - [`BookCreate`], [`AuthorCreate`], [`CategoryCreate`] - Write payloads
//! - [`Params`] - Filter and pagination parameters for list queries
//! - [`Page`] - The canonical paginated result
//! - [`PageEnvelope`] - The paginated shape some backend endpoints emit
//! - [`ErrorInfo`] - The uniform error surfaced by every client call
//! - [`Resource`] - Per-kind endpoint and identity metadata
//!
//! # Example
//!
//! ```
//! use bookkeep_core::{BookFilter, Params, SortDir};
//!
//! let params = Params::<BookFilter>::default()
//!     .with_size(20)
//!     .with_sort("title", SortDir::Asc);
//!
//! assert_eq!(params.paging.page, 0);
//! assert_eq!(params.paging.size, 20);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use jiff::civil::DateTime;
use jiff::Timestamp;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Page sizes a list view may request.
pub const PAGE_SIZES: [u32; 4] = [10, 20, 50, 100];

/// Page size used when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Returns `true` if `size` is one of [`PAGE_SIZES`].
pub fn is_allowed_page_size(size: u32) -> bool {
    PAGE_SIZES.contains(&size)
}

/// A server-managed record with a stable string identifier.
///
/// Each resource kind also carries the endpoint layout it is served under.
/// The backend is not uniform here: books and authors are created through
/// `{collection}/create`, categories through the collection itself.
pub trait Resource:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Payload for create and full-replace update.
    type Create: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Resource-specific list filter.
    type Filter: ListFilter;

    /// Singular human name, used in messages (e.g. `"book"`).
    const NAME: &'static str;

    /// Collection path below the API base (e.g. `"/books"`).
    const COLLECTION: &'static str;

    /// Path that accepts `POST` for creation.
    const CREATE_PATH: &'static str;

    /// Query key carrying the search term on `{collection}/search`.
    const SEARCH_KEY: &'static str;

    /// Stable identifier.
    fn id(&self) -> &str;
}

/// Filter fields appended to a list query.
///
/// `None` fields are omitted from the query string.
pub trait ListFilter:
    Clone + fmt::Debug + Default + PartialEq + Serialize + Send + Sync + 'static
{
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDir::Asc => f.write_str("asc"),
            SortDir::Desc => f.write_str("desc"),
        }
    }
}

/// Pagination and sort part of a list query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: u32,
    /// Items per page, one of [`PAGE_SIZES`].
    pub size: u32,
    /// Field to sort by.
    pub sort_by: String,
    /// Sort direction.
    pub sort_dir: SortDir,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort_by: "id".to_string(),
            sort_dir: SortDir::Asc,
        }
    }
}

/// Filter and pagination parameters for one list request.
///
/// Parameters are plain values: every change produces a new `Params`, and
/// two requests are the same query exactly when their params compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Params<F> {
    #[serde(flatten)]
    pub paging: PageRequest,
    #[serde(flatten)]
    pub filter: F,
}

impl<F> Params<F> {
    pub fn with_page(mut self, page: u32) -> Self {
        self.paging.page = page;
        self
    }

    /// Sets the page size. Changing the size resets the page index to 0.
    pub fn with_size(mut self, size: u32) -> Self {
        if size != self.paging.size {
            self.paging.page = 0;
        }
        self.paging.size = size;
        self
    }

    pub fn with_sort(mut self, sort_by: impl Into<String>, sort_dir: SortDir) -> Self {
        self.paging.sort_by = sort_by.into();
        self.paging.sort_dir = sort_dir;
        self
    }

    pub fn with_filter(mut self, filter: F) -> Self {
        self.filter = filter;
        self
    }
}

/// Filters accepted by `GET /books`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    /// Only books whose stock is at or below this threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_threshold: Option<u32>,
}

impl ListFilter for BookFilter {}

/// Filters accepted by `GET /authors` and `GET /categories`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ListFilter for NameFilter {}

/// A book. Author and category are denormalized into the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, with = "local_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, with = "local_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

/// Payload for creating or replacing a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookCreate {
    pub title: String,
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub author_id: String,
    pub category_id: String,
}

impl Resource for Book {
    type Create = BookCreate;
    type Filter = BookFilter;

    const NAME: &'static str = "book";
    const COLLECTION: &'static str = "/books";
    const CREATE_PATH: &'static str = "/books/create";
    const SEARCH_KEY: &'static str = "title";

    fn id(&self) -> &str {
        &self.id
    }
}

/// An author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    #[serde(default, with = "local_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, with = "local_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

/// Payload for creating or replacing an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCreate {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
}

impl Resource for Author {
    type Create = AuthorCreate;
    type Filter = NameFilter;

    const NAME: &'static str = "author";
    const COLLECTION: &'static str = "/authors";
    const CREATE_PATH: &'static str = "/authors/create";
    const SEARCH_KEY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub books_count: Option<u32>,
    #[serde(default, with = "local_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
    #[serde(default, with = "local_time", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,
}

/// Payload for creating or replacing a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Resource for Category {
    type Create = CategoryCreate;
    type Filter = NameFilter;

    const NAME: &'static str = "category";
    const COLLECTION: &'static str = "/categories";
    const CREATE_PATH: &'static str = "/categories";
    const SEARCH_KEY: &'static str = "name";

    fn id(&self) -> &str {
        &self.id
    }
}

/// A single page of a larger ordered collection.
///
/// This is the one shape every list and search call resolves to, whatever
/// the backend actually sent.
///
/// # Example
///
/// ```
/// use bookkeep_core::Page;
///
/// let page = Page::new(vec!["a", "b", "c"], 23, 2, 10);
///
/// assert_eq!(page.total_pages, 3);
/// assert!(page.is_last);
/// assert!(!page.is_first);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Total number of pages.
    pub total_pages: u32,
    /// Total number of items across all pages.
    pub total_elements: u64,
    /// Zero-based index of this page.
    pub page_index: u32,
    /// Number of items per page.
    pub page_size: u32,
    pub is_first: bool,
    pub is_last: bool,
    pub is_empty: bool,
}

impl<T> Page<T> {
    /// Creates a page, computing `total_pages` and the boundary flags.
    pub fn new(items: Vec<T>, total_elements: u64, page_index: u32, page_size: u32) -> Self {
        let total_pages = total_pages(total_elements, page_size);
        Self {
            items,
            total_pages,
            total_elements,
            page_index,
            page_size,
            is_first: page_index == 0,
            is_last: is_last_page(page_index, total_pages),
            is_empty: total_elements == 0,
        }
    }

    /// An empty page with zero counts.
    pub fn empty(page_index: u32, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total_pages: 0,
            total_elements: 0,
            page_index,
            page_size,
            is_first: true,
            is_last: true,
            is_empty: true,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_pages: self.total_pages,
            total_elements: self.total_elements,
            page_index: self.page_index,
            page_size: self.page_size,
            is_first: self.is_first,
            is_last: self.is_last,
            is_empty: self.is_empty,
        }
    }

    /// Converts every item, failing on the first conversion error.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            items,
            total_pages: self.total_pages,
            total_elements: self.total_elements,
            page_index: self.page_index,
            page_size: self.page_size,
            is_first: self.is_first,
            is_last: self.is_last,
            is_empty: self.is_empty,
        })
    }
}

/// Number of pages needed for `total` items at `size` per page.
pub fn total_pages(total: u64, size: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(size)) as u32
}

/// `true` when `page_index` is at or past the final page.
pub fn is_last_page(page_index: u32, total_pages: u32) -> bool {
    page_index >= total_pages.saturating_sub(1)
}

/// The paginated envelope emitted by paginating backend endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEnvelope<T> {
    pub content: Vec<T>,
    pub total_pages: u32,
    pub total_elements: u64,
    pub size: u32,
    pub number: u32,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
}

impl<T> From<Page<T>> for PageEnvelope<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            content: page.items,
            total_pages: page.total_pages,
            total_elements: page.total_elements,
            size: page.page_size,
            number: page.page_index,
            first: page.is_first,
            last: page.is_last,
            empty: page.is_empty,
        }
    }
}

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Transport failure, no response received.
    NetworkFailure,
    /// 4xx other than 404, usually with field-level detail.
    ValidationFailed,
    /// 404.
    NotFound,
    /// 5xx.
    ServerError,
    /// Response could not be understood.
    Unknown,
}

impl ErrorKind {
    /// Maps a non-2xx HTTP status to its error kind.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorKind::NotFound,
            400..=499 => ErrorKind::ValidationFailed,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NetworkFailure => "NetworkFailure",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::ServerError => "ServerError",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// The uniform error every client operation reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{error_kind} ({status_code}) {path}: {message}")]
pub struct ErrorInfo {
    pub message: String,
    /// HTTP status, or 0 when no response was received.
    pub status_code: u16,
    pub error_kind: ErrorKind,
    pub path: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
    /// Per-field validation messages.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
}

impl ErrorInfo {
    pub fn new(
        error_kind: ErrorKind,
        status_code: u16,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            status_code,
            error_kind,
            path: path.into(),
            timestamp: Timestamp::now().to_string(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn with_field_errors(mut self, field_errors: BTreeMap<String, String>) -> Self {
        self.field_errors = field_errors;
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind == ErrorKind::NotFound
    }
}

/// Error body sent by the backend on non-2xx responses.
///
/// Every field is optional on the way in; a partially filled envelope still
/// yields a usable [`ErrorInfo`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub validation_errors: BTreeMap<String, String>,
}

/// A book ranked by the AI service.
///
/// Returned by both recommendations and semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredBook {
    pub book_id: String,
    pub title: String,
    pub score: f64,
}

/// Result of `POST /ai/embeddings/recompute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    pub updated: u32,
    pub total: u32,
    pub message: String,
}

/// Result of `POST /ai/embeddings/book/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingUpdate {
    pub book_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Serde adapter for resource timestamps.
///
/// The backend writes local date-times without an offset, such as
/// `2024-05-01T10:00:00.123`. A value that does carry an offset is converted
/// to UTC. Output is always the offset-less form.
pub mod local_time {
    use jiff::civil::DateTime;
    use jiff::tz::TimeZone;
    use jiff::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Parses either form into a civil date-time.
    pub fn parse(text: &str) -> Result<DateTime, jiff::Error> {
        match text.parse::<Timestamp>() {
            Ok(instant) => Ok(instant.to_zoned(TimeZone::UTC).datetime()),
            Err(_) => text.parse::<DateTime>(),
        }
    }

    /// The current time in UTC, without an offset.
    pub fn now() -> DateTime {
        Timestamp::now().to_zoned(TimeZone::UTC).datetime()
    }

    pub fn serialize<S: Serializer>(value: &Option<DateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(datetime) => serializer.collect_str(datetime),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| parse(&text).map_err(serde::de::Error::custom))
            .transpose()
    }
}
