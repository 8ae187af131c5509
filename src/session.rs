//! One client session: a list controller per resource kind plus the AI
//! client, sharing a single HTTP connection pool.

use std::sync::Arc;
use std::time::Duration;

use bookkeep_core::{Author, Book, Category, Params, Resource};

use crate::ai::AiClient;
use crate::client::{Http, ResourceClient};
use crate::config::Config;
use crate::controller::ListController;
use crate::debounce::DebouncedSearch;

pub struct Session {
    http: Http,
    books: ListController<Book>,
    authors: ListController<Author>,
    categories: ListController<Category>,
    ai: AiClient,
    debounce: Duration,
}

fn controller<R: Resource>(http: &Http, page_size: u32) -> ListController<R> {
    let api = Arc::new(ResourceClient::<R>::new(http.clone()));
    ListController::new(api, Params::default().with_size(page_size))
}

impl Session {
    /// Builds the HTTP client from `config` and idle controllers on top of it.
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let http = Http::new(&config.base_url, config.timeout())?;
        Ok(Self::with_http(http, config.page_size, config.debounce()))
    }

    pub fn with_http(http: Http, page_size: u32, debounce: Duration) -> Self {
        Self {
            books: controller(&http, page_size),
            authors: controller(&http, page_size),
            categories: controller(&http, page_size),
            ai: AiClient::new(http.clone()),
            http,
            debounce,
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    pub fn books(&self) -> &ListController<Book> {
        &self.books
    }

    pub fn authors(&self) -> &ListController<Author> {
        &self.authors
    }

    pub fn categories(&self) -> &ListController<Category> {
        &self.categories
    }

    pub fn ai(&self) -> &AiClient {
        &self.ai
    }

    /// Search-as-you-type input bound to `list`, using the configured delay.
    pub fn debounced_search<R: Resource>(&self, list: &ListController<R>) -> DebouncedSearch<R> {
        DebouncedSearch::new(list.clone(), self.debounce)
    }

    /// Closes every controller; pending requests are abandoned.
    pub fn close(&self) {
        self.books.close();
        self.authors.close();
        self.categories.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
