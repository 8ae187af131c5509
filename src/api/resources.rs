//! Book, author, and category endpoints.

use std::collections::HashMap;

use bookkeep_core::{BookFilter, PageEnvelope, PageRequest, SortDir};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Response, StatusCode};

use crate::api::{json, no_content, read_json};
use crate::catalog::Catalog;
use crate::error::{Error, Result};

type Query = HashMap<String, String>;

/// Paging and sorting, defaulting like a Spring `Pageable`.
fn page_request(query: &Query) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest {
        page: query.get("page").and_then(|p| p.parse().ok()).unwrap_or(defaults.page),
        size: query
            .get("size")
            .and_then(|s| s.parse().ok())
            .filter(|s| *s > 0)
            .unwrap_or(defaults.size),
        sort_by: query
            .get("sortBy")
            .filter(|s| !s.is_empty())
            .cloned()
            .unwrap_or(defaults.sort_by),
        sort_dir: match query.get("sortDir") {
            Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDir::Desc,
            _ => SortDir::Asc,
        },
    }
}

fn book_filter(query: &Query) -> BookFilter {
    let number = |key: &str| query.get(key).and_then(|v| v.parse().ok());
    BookFilter {
        title: query.get("title").cloned(),
        author_id: query.get("authorId").cloned(),
        category_id: query.get("categoryId").cloned(),
        min_price: number("minPrice"),
        max_price: number("maxPrice"),
        stock_threshold: query.get("stockThreshold").and_then(|v| v.parse().ok()),
    }
}

fn required<'a>(query: &'a Query, name: &str) -> Result<&'a str> {
    query
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::BadRequest(format!("Required parameter '{name}' is not present")))
}

/// Handle GET /api/books
pub async fn list_books(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let page = catalog.list_books(&page_request(query), &book_filter(query)).await?;
    json(StatusCode::OK, &PageEnvelope::from(page))
}

/// Handle GET /api/books/search
pub async fn search_books(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let books = catalog.search_books(required(query, "title")?).await?;
    json(StatusCode::OK, &books)
}

/// Handle GET /api/books/{id}
pub async fn get_book(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    json(StatusCode::OK, &catalog.get_book(id).await?)
}

/// Handle POST /api/books/create
pub async fn create_book(catalog: &dyn Catalog, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let book = catalog.create_book(read_json(body).await?).await?;
    json(StatusCode::CREATED, &book)
}

/// Handle PUT /api/books/{id}
pub async fn update_book(catalog: &dyn Catalog, id: &str, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let book = catalog.update_book(id, read_json(body).await?).await?;
    json(StatusCode::OK, &book)
}

/// Handle DELETE /api/books/{id}
pub async fn delete_book(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    catalog.delete_book(id).await?;
    Ok(no_content())
}

/// Handle GET /api/authors
pub async fn list_authors(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let name = query.get("name").map(String::as_str);
    let page = catalog.list_authors(&page_request(query), name).await?;
    json(StatusCode::OK, &PageEnvelope::from(page))
}

pub async fn search_authors(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let authors = catalog.search_authors(required(query, "name")?).await?;
    json(StatusCode::OK, &authors)
}

pub async fn get_author(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    json(StatusCode::OK, &catalog.get_author(id).await?)
}

pub async fn create_author(catalog: &dyn Catalog, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let author = catalog.create_author(read_json(body).await?).await?;
    json(StatusCode::CREATED, &author)
}

pub async fn update_author(catalog: &dyn Catalog, id: &str, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let author = catalog.update_author(id, read_json(body).await?).await?;
    json(StatusCode::OK, &author)
}

pub async fn delete_author(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    catalog.delete_author(id).await?;
    Ok(no_content())
}

/// Handle GET /api/categories
///
/// Answers a bare array sorted by `sortBy`; `page` and `size` are ignored.
pub async fn list_categories(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let name = query.get("name").map(String::as_str);
    let categories = catalog.list_categories(&page_request(query), name).await?;
    json(StatusCode::OK, &categories)
}

pub async fn search_categories(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let categories = catalog.search_categories(required(query, "name")?).await?;
    json(StatusCode::OK, &categories)
}

pub async fn get_category(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    json(StatusCode::OK, &catalog.get_category(id).await?)
}

/// Handle POST /api/categories
pub async fn create_category(catalog: &dyn Catalog, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let category = catalog.create_category(read_json(body).await?).await?;
    json(StatusCode::CREATED, &category)
}

pub async fn update_category(catalog: &dyn Catalog, id: &str, body: Incoming) -> Result<Response<Full<Bytes>>> {
    let category = catalog.update_category(id, read_json(body).await?).await?;
    json(StatusCode::OK, &category)
}

pub async fn delete_category(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    catalog.delete_category(id).await?;
    Ok(no_content())
}
