//! Canonicalization of list responses.
//!
//! The backend is inconsistent across endpoints: some return a paginated
//! envelope (`{content, totalPages, totalElements, size, number, ...}`),
//! others a bare JSON array. Everything downstream sees a [`Page`].

use bookkeep_core::{is_last_page, Page, PageRequest};
use serde_json::{Map, Value};

/// Page index and size the caller asked for.
///
/// Used to fill in metadata the response does not carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requested {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl From<&PageRequest> for Requested {
    fn from(paging: &PageRequest) -> Self {
        Self {
            page: Some(paging.page),
            size: Some(paging.size),
        }
    }
}

/// Converts a raw list response into a [`Page`]. Never fails.
///
/// - An object with a `content` array is taken as an envelope; absent
///   metadata is computed from what is present.
/// - A bare array becomes a single page holding every element.
/// - Anything else becomes an empty page.
pub fn normalize(raw: Value, requested: Requested) -> Page<Value> {
    match raw {
        Value::Object(mut object) => match object.remove("content") {
            Some(Value::Array(content)) => from_envelope(content, &object, requested),
            _ => empty(requested),
        },
        Value::Array(items) => single_page(items, requested),
        _ => empty(requested),
    }
}

fn from_envelope(items: Vec<Value>, meta: &Map<String, Value>, requested: Requested) -> Page<Value> {
    let len = items.len() as u64;

    let page_index = uint(meta, "number").or(requested.page).unwrap_or(0);
    let page_size = uint(meta, "size")
        .or(requested.size)
        .unwrap_or(len as u32)
        .max(len as u32);
    let total_elements = meta
        .get("totalElements")
        .and_then(Value::as_u64)
        .unwrap_or(len);
    let total_pages = uint(meta, "totalPages").unwrap_or(1);

    Page {
        items,
        total_pages,
        total_elements,
        page_index,
        page_size,
        is_first: flag(meta, "first").unwrap_or(page_index == 0),
        is_last: flag(meta, "last").unwrap_or_else(|| is_last_page(page_index, total_pages)),
        is_empty: flag(meta, "empty").unwrap_or(total_elements == 0),
    }
}

fn single_page(items: Vec<Value>, requested: Requested) -> Page<Value> {
    let len = items.len() as u32;
    Page {
        total_pages: 1,
        total_elements: u64::from(len),
        page_index: requested.page.unwrap_or(0),
        // A bare array may hold more than was asked for; widen the size so
        // the page never claims fewer slots than it has items.
        page_size: requested.size.unwrap_or(len).max(len),
        is_first: true,
        is_last: true,
        is_empty: len == 0,
        items,
    }
}

fn empty(requested: Requested) -> Page<Value> {
    Page::empty(requested.page.unwrap_or(0), requested.size.unwrap_or(0))
}

fn uint(meta: &Map<String, Value>, key: &str) -> Option<u32> {
    meta.get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn flag(meta: &Map<String, Value>, key: &str) -> Option<bool> {
    meta.get(key).and_then(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(page: u32, size: u32) -> Requested {
        Requested {
            page: Some(page),
            size: Some(size),
        }
    }

    #[test]
    fn bare_array_is_single_page() {
        let page = normalize(json!([{"id": "1"}, {"id": "2"}, {"id": "3"}]), Requested::default());

        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.page_index, 0);
        assert_eq!(page.page_size, 3);
        assert!(page.is_first);
        assert!(page.is_last);
        assert!(!page.is_empty);
    }

    #[test]
    fn bare_array_uses_requested_page() {
        let page = normalize(json!([{"id": "1"}]), req(2, 20));

        assert_eq!(page.page_index, 2);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.total_pages, 1);
        assert!(page.is_first && page.is_last);
    }

    #[test]
    fn empty_bare_array() {
        let page = normalize(json!([]), Requested::default());

        assert!(page.is_empty);
        assert_eq!(page.total_elements, 0);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn full_envelope_passes_through() {
        let raw = json!({
            "content": [{"id": "11"}, {"id": "12"}],
            "totalPages": 6,
            "totalElements": 52,
            "size": 10,
            "number": 1,
            "first": false,
            "last": false,
            "empty": false
        });
        let page = normalize(raw, req(0, 50));

        assert_eq!(page.items, vec![json!({"id": "11"}), json!({"id": "12"})]);
        assert_eq!(page.total_pages, 6);
        assert_eq!(page.total_elements, 52);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.page_index, 1);
        assert!(!page.is_first);
        assert!(!page.is_last);
        assert!(!page.is_empty);
    }

    #[test]
    fn sparse_envelope_computes_missing_fields() {
        let raw = json!({
            "content": [{"id": "1", "title": "Go"}],
            "totalElements": 1,
            "totalPages": 1,
            "number": 0
        });
        let page = normalize(raw, req(0, 10));

        assert_eq!(page.page_size, 10);
        assert!(page.is_first);
        assert!(page.is_last);
        assert!(!page.is_empty);
    }

    #[test]
    fn envelope_without_totals_defaults_to_one_page() {
        let page = normalize(json!({"content": [{"id": "1"}, {"id": "2"}]}), Requested::default());

        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.page_index, 0);
        assert_eq!(page.page_size, 2);
        assert!(page.is_last);
    }

    #[test]
    fn null_and_malformed_are_empty() {
        for raw in [Value::Null, json!("oops"), json!(42), json!({"content": "nope"}), json!({})] {
            let page = normalize(raw, req(3, 20));
            assert!(page.items.is_empty());
            assert!(page.is_empty);
            assert_eq!(page.total_pages, 0);
            assert_eq!(page.total_elements, 0);
            assert_eq!(page.page_index, 3);
            assert_eq!(page.page_size, 20);
        }

        let page = normalize(Value::Null, Requested::default());
        assert_eq!(page.page_index, 0);
        assert_eq!(page.page_size, 0);
    }
}
