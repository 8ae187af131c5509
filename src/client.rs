//! Typed access to the resource endpoints.

use std::marker::PhantomData;

use async_trait::async_trait;
use bookkeep_core::{ErrorInfo, Page, Params, Resource};
use reqwest::Method;
use tracing::debug;

use crate::normalize::{normalize, Requested};

pub mod http;

pub use http::Http;

/// Result of a client call.
pub type ApiResult<T> = std::result::Result<T, ErrorInfo>;

/// Operations on one resource kind.
///
/// Implementations report every failure as an [`ErrorInfo`].
#[async_trait]
pub trait ResourceApi<R: Resource>: Send + Sync {
    /// List one page, normalized whatever shape the backend returned.
    async fn list(&self, params: &Params<R::Filter>) -> ApiResult<Page<R>>;

    /// Fetch one resource. Absence is a `NotFound` error.
    async fn get(&self, id: &str) -> ApiResult<R>;

    /// Create a resource; the server assigns the id.
    async fn create(&self, dto: &R::Create) -> ApiResult<R>;

    /// Replace a resource in full.
    async fn update(&self, id: &str, dto: &R::Create) -> ApiResult<R>;

    /// Delete a resource. Deleting something already gone succeeds.
    async fn delete(&self, id: &str) -> ApiResult<()>;

    /// Search by the resource's search key, paginated like `list`.
    async fn search(&self, query: &str, params: &Params<R::Filter>) -> ApiResult<Page<R>>;
}

/// Collection name without the leading slash, e.g. `"categories"`.
pub(crate) fn plural<R: Resource>() -> &'static str {
    R::COLLECTION.trim_start_matches('/')
}

/// HTTP implementation of [`ResourceApi`].
pub struct ResourceClient<R> {
    http: Http,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for ResourceClient<R> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> ResourceClient<R> {
    pub fn new(http: Http) -> Self {
        Self {
            http,
            _resource: PhantomData,
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", R::COLLECTION, id)
    }

    async fn fetch_page(
        &self,
        request: reqwest::RequestBuilder,
        path: &str,
        operation: &str,
        params: &Params<R::Filter>,
    ) -> ApiResult<Page<R>> {
        let response = self.http.send(request, path, operation).await?;
        let status = response.status();
        let raw = self.http.value(response, path).await?;

        normalize(raw, Requested::from(&params.paging)).try_map(|item| {
            serde_json::from_value(item).map_err(|e| {
                http::unknown(status, format!("Unexpected {} shape: {e}", R::NAME), path)
            })
        })
    }
}

#[async_trait]
impl<R: Resource> ResourceApi<R> for ResourceClient<R> {
    async fn list(&self, params: &Params<R::Filter>) -> ApiResult<Page<R>> {
        let path = R::COLLECTION;
        let request = self.http.request(Method::GET, path).query(params);
        self.fetch_page(request, path, &format!("fetch {}", plural::<R>()), params)
            .await
    }

    async fn get(&self, id: &str) -> ApiResult<R> {
        let path = Self::item_path(id);
        let request = self.http.request(Method::GET, &path);
        let response = self
            .http
            .send(request, &path, &format!("fetch {}", R::NAME))
            .await?;
        self.http.json(response, &path).await
    }

    async fn create(&self, dto: &R::Create) -> ApiResult<R> {
        let path = R::CREATE_PATH;
        let request = self.http.request(Method::POST, path).json(dto);
        let response = self
            .http
            .send(request, path, &format!("create {}", R::NAME))
            .await?;
        self.http.json(response, path).await
    }

    async fn update(&self, id: &str, dto: &R::Create) -> ApiResult<R> {
        let path = Self::item_path(id);
        let request = self.http.request(Method::PUT, &path).json(dto);
        let response = self
            .http
            .send(request, &path, &format!("update {}", R::NAME))
            .await?;
        self.http.json(response, &path).await
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        let path = Self::item_path(id);
        let request = self.http.request(Method::DELETE, &path);
        match self
            .http
            .send(request, &path, &format!("delete {}", R::NAME))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                debug!("{} {} already deleted", R::NAME, id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn search(&self, query: &str, params: &Params<R::Filter>) -> ApiResult<Page<R>> {
        let path = format!("{}/search", R::COLLECTION);
        let request = self
            .http
            .request(Method::GET, &path)
            .query(&params.paging)
            .query(&[(R::SEARCH_KEY, query)]);
        self.fetch_page(request, &path, &format!("search {}", plural::<R>()), params)
            .await
    }
}
