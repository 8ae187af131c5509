//! Client for the AI recommendation and semantic search service.

use bookkeep_core::{EmbeddingUpdate, RecomputeSummary, ScoredBook};
use reqwest::Method;

use crate::client::{ApiResult, Http};

/// Default number of recommendations requested.
pub const DEFAULT_RECOMMENDATIONS: u32 = 6;

/// Default number of semantic search hits requested.
pub const DEFAULT_SEARCH_HITS: u32 = 10;

/// AI endpoints under `/ai`.
#[derive(Debug, Clone)]
pub struct AiClient {
    http: Http,
}

impl AiClient {
    pub fn new(http: Http) -> Self {
        Self { http }
    }

    /// Books similar to `book_id`, best first.
    pub async fn recommendations(&self, book_id: &str, size: u32) -> ApiResult<Vec<ScoredBook>> {
        let path = format!("/ai/recommendations/book/{book_id}");
        let request = self
            .http
            .request(Method::GET, &path)
            .query(&[("size", size)]);
        let response = self.http.send(request, &path, "fetch recommendations").await?;
        self.http.json(response, &path).await
    }

    /// Books whose meaning matches `query`, best first.
    pub async fn semantic_search(&self, query: &str, size: u32) -> ApiResult<Vec<ScoredBook>> {
        let path = "/ai/semantic-search";
        let request = self
            .http
            .request(Method::GET, path)
            .query(&[("q", query)])
            .query(&[("size", size)]);
        let response = self.http.send(request, path, "run semantic search").await?;
        self.http.json(response, path).await
    }

    /// Recompute embeddings for every book; without `force`, books that
    /// already have one are skipped.
    pub async fn recompute_embeddings(&self, force: bool) -> ApiResult<RecomputeSummary> {
        let path = "/ai/embeddings/recompute";
        let request = self
            .http
            .request(Method::POST, path)
            .query(&[("force", force)]);
        let response = self.http.send(request, path, "recompute embeddings").await?;
        self.http.json(response, path).await
    }

    /// Recompute the embedding of one book.
    pub async fn update_book_embedding(&self, book_id: &str) -> ApiResult<EmbeddingUpdate> {
        let path = format!("/ai/embeddings/book/{book_id}");
        let request = self.http.request(Method::POST, &path);
        let response = self.http.send(request, &path, "update book embedding").await?;
        self.http.json(response, &path).await
    }
}
