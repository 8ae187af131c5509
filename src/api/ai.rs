use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::ai::{DEFAULT_RECOMMENDATIONS, DEFAULT_SEARCH_HITS};
use crate::api::json;
use crate::catalog::Catalog;
use crate::error::{Error, Result};

type Query = HashMap<String, String>;

fn size(query: &Query, default: u32) -> usize {
    query
        .get("size")
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(default) as usize
}

/// Handle GET /api/ai/recommendations/book/{id}
pub async fn recommendations(catalog: &dyn Catalog, id: &str, query: &Query) -> Result<Response<Full<Bytes>>> {
    let hits = catalog
        .recommendations(id, size(query, DEFAULT_RECOMMENDATIONS))
        .await?;
    json(StatusCode::OK, &hits)
}

/// Handle GET /api/ai/semantic-search
pub async fn semantic_search(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let q = query
        .get("q")
        .ok_or_else(|| Error::BadRequest("Required parameter 'q' is not present".to_string()))?;
    let hits = catalog.semantic_search(q, size(query, DEFAULT_SEARCH_HITS)).await?;
    json(StatusCode::OK, &hits)
}

/// Handle POST /api/ai/embeddings/recompute
pub async fn recompute(catalog: &dyn Catalog, query: &Query) -> Result<Response<Full<Bytes>>> {
    let force = query.get("force").is_some_and(|f| f.eq_ignore_ascii_case("true"));
    json(StatusCode::OK, &catalog.recompute_embeddings(force).await?)
}

/// Handle POST /api/ai/embeddings/book/{id}
pub async fn update_book_embedding(catalog: &dyn Catalog, id: &str) -> Result<Response<Full<Bytes>>> {
    json(StatusCode::OK, &catalog.update_book_embedding(id).await?)
}
