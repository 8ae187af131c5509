use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bookkeep_core::ErrorEnvelope;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use matchit::Router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{error_response, Error, Result};

pub mod ai;
pub mod health;
pub mod resources;

/// Route identifier
#[derive(Clone, Copy, Debug)]
enum Route {
    Health,
    Books,
    BookCreate,
    BookSearch,
    Book,
    Authors,
    AuthorCreate,
    AuthorSearch,
    Author,
    Categories,
    CategorySearch,
    Category,
    Recommendations,
    SemanticSearch,
    RecomputeEmbeddings,
    BookEmbedding,
}

/// Build the router
fn build_router() -> std::result::Result<Router<Route>, matchit::InsertError> {
    let mut router = Router::new();
    router.insert("/health", Route::Health)?;
    router.insert("/api/books", Route::Books)?;
    router.insert("/api/books/create", Route::BookCreate)?;
    router.insert("/api/books/search", Route::BookSearch)?;
    router.insert("/api/books/{id}", Route::Book)?;
    router.insert("/api/authors", Route::Authors)?;
    router.insert("/api/authors/create", Route::AuthorCreate)?;
    router.insert("/api/authors/search", Route::AuthorSearch)?;
    router.insert("/api/authors/{id}", Route::Author)?;
    router.insert("/api/categories", Route::Categories)?;
    router.insert("/api/categories/search", Route::CategorySearch)?;
    router.insert("/api/categories/{id}", Route::Category)?;
    router.insert("/api/ai/recommendations/book/{id}", Route::Recommendations)?;
    router.insert("/api/ai/semantic-search", Route::SemanticSearch)?;
    router.insert("/api/ai/embeddings/recompute", Route::RecomputeEmbeddings)?;
    router.insert("/api/ai/embeddings/book/{id}", Route::BookEmbedding)?;
    Ok(router)
}

/// Handle incoming requests
async fn handle_request(
    req: Request<Incoming>,
    catalog: Arc<dyn Catalog>,
    router: Arc<Router<Route>>,
) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = parse_query(req.uri().query());

    debug!("{} {}", method, path);

    // Match route
    let matched = match router.at(&path) {
        Ok(m) => m,
        Err(_) => return Ok(plain_error(StatusCode::NOT_FOUND, "No handler found", &path)),
    };

    let route = *matched.value;
    let id = matched.params.get("id").unwrap_or_default().to_string();
    let body = req.into_body();
    let catalog = catalog.as_ref();

    // Dispatch to handler
    let result = match (method, route) {
        (Method::GET, Route::Health) => health::health().await,

        (Method::GET, Route::Books) => resources::list_books(catalog, &query).await,
        (Method::POST, Route::BookCreate) => resources::create_book(catalog, body).await,
        (Method::GET, Route::BookSearch) => resources::search_books(catalog, &query).await,
        (Method::GET, Route::Book) => resources::get_book(catalog, &id).await,
        (Method::PUT, Route::Book) => resources::update_book(catalog, &id, body).await,
        (Method::DELETE, Route::Book) => resources::delete_book(catalog, &id).await,

        (Method::GET, Route::Authors) => resources::list_authors(catalog, &query).await,
        (Method::POST, Route::AuthorCreate) => resources::create_author(catalog, body).await,
        (Method::GET, Route::AuthorSearch) => resources::search_authors(catalog, &query).await,
        (Method::GET, Route::Author) => resources::get_author(catalog, &id).await,
        (Method::PUT, Route::Author) => resources::update_author(catalog, &id, body).await,
        (Method::DELETE, Route::Author) => resources::delete_author(catalog, &id).await,

        (Method::GET, Route::Categories) => resources::list_categories(catalog, &query).await,
        (Method::POST, Route::Categories) => resources::create_category(catalog, body).await,
        (Method::GET, Route::CategorySearch) => resources::search_categories(catalog, &query).await,
        (Method::GET, Route::Category) => resources::get_category(catalog, &id).await,
        (Method::PUT, Route::Category) => resources::update_category(catalog, &id, body).await,
        (Method::DELETE, Route::Category) => resources::delete_category(catalog, &id).await,

        (Method::GET, Route::Recommendations) => ai::recommendations(catalog, &id, &query).await,
        (Method::GET, Route::SemanticSearch) => ai::semantic_search(catalog, &query).await,
        (Method::POST, Route::RecomputeEmbeddings) => ai::recompute(catalog, &query).await,
        (Method::POST, Route::BookEmbedding) => ai::update_book_embedding(catalog, &id).await,

        (method, route) => {
            debug!("{} not allowed on {:?}", method, route);
            return Ok(plain_error(
                StatusCode::METHOD_NOT_ALLOWED,
                &format!("Request method '{method}' is not supported"),
                &path,
            ));
        }
    };

    // Convert result to response
    match result {
        Ok(response) => Ok(response),
        Err(e) => {
            warn!("{} failed: {}", path, e);
            Ok(e.into_response(&path))
        }
    }
}

fn plain_error(status: StatusCode, message: &str, path: &str) -> Response<Full<Bytes>> {
    let envelope = ErrorEnvelope {
        timestamp: Some(jiff::Timestamp::now().to_string()),
        status: Some(status.as_u16()),
        error: status.canonical_reason().map(String::from),
        message: Some(message.to_string()),
        path: Some(path.to_string()),
        validation_errors: Default::default(),
    };
    error_response(status, &envelope)
}

/// Serialize `value` as a JSON response
pub(crate) fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Full<Bytes>>> {
    let body = serde_json::to_string(value)?;
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

pub(crate) fn no_content() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

/// Read and deserialize a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(body: Incoming) -> Result<T> {
    let bytes = body
        .collect()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read request body: {e}")))?
        .to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

/// Parse a query string into decoded key/value pairs
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(q) = query {
        for part in q.split('&') {
            if let Some((key, value)) = part.split_once('=') {
                map.insert(urlencoding_decode(key), urlencoding_decode(value));
            }
        }
    }
    map
}

fn urlencoding_decode(s: &str) -> String {
    let mut bytes = Vec::with_capacity(s.len());
    let mut input = s.bytes();

    while let Some(b) = input.next() {
        match b {
            b'%' => {
                let hex: Vec<u8> = input.by_ref().take(2).collect();
                match std::str::from_utf8(&hex).ok().and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => bytes.push(byte),
                    None => {
                        bytes.push(b'%');
                        bytes.extend_from_slice(&hex);
                    }
                }
            }
            b'+' => bytes.push(b' '),
            other => bytes.push(other),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

/// Bind the configured address
pub async fn bind(config: &Config) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    Ok(TcpListener::bind(addr).await?)
}

/// Serve the catalog on an already bound listener
pub async fn serve(listener: TcpListener, catalog: Arc<dyn Catalog>) -> anyhow::Result<()> {
    let router = Arc::new(build_router()?);

    info!("Server listening on http://{}", listener.local_addr()?);

    loop {
        let (stream, remote_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let catalog = Arc::clone(&catalog);
        let router = Arc::clone(&router);

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let catalog = Arc::clone(&catalog);
                let router = Arc::clone(&router);
                handle_request(req, catalog, router)
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection from {}: {}", remote_addr, e);
            }
        });
    }
}

/// Run the HTTP server
pub async fn run(config: Config, catalog: Arc<dyn Catalog>) -> anyhow::Result<()> {
    let listener = bind(&config).await?;
    serve(listener, catalog).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_decoded() {
        let query = parse_query(Some("title=Caf%C3%A9+Society&page=2&flag"));

        assert_eq!(query["title"], "Café Society");
        assert_eq!(query["page"], "2");
        assert!(!query.contains_key("flag"));
    }

    #[test]
    fn malformed_escape_is_kept() {
        assert_eq!(urlencoding_decode("100%zz"), "100%zz");
    }

    #[test]
    fn static_segments_win_over_ids() {
        let router = build_router().unwrap();

        assert!(matches!(*router.at("/api/books/search").unwrap().value, Route::BookSearch));
        assert!(matches!(*router.at("/api/books/create").unwrap().value, Route::BookCreate));
        assert!(matches!(*router.at("/api/books/42").unwrap().value, Route::Book));
        assert!(router.at("/api/publishers").is_err());
    }
}
