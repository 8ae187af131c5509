//! In-memory [`ResourceApi`] for controller tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

use async_trait::async_trait;
use bookkeep_core::{Author, AuthorCreate, ErrorInfo, ErrorKind, Page, Params, NameFilter};
use tokio::sync::oneshot;

use crate::client::{ApiResult, ResourceApi};

type Gate = oneshot::Receiver<ApiResult<Page<Author>>>;

pub(crate) fn author(id: u32, name: &str) -> Author {
    Author {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("author{id}@example.com"),
        biography: None,
        created_at: None,
        updated_at: None,
    }
}

/// Authors kept in a vector. List calls can be held open with [`gate`]
/// to control completion order.
///
/// [`gate`]: FakeApi::gate
#[derive(Default)]
pub(crate) struct FakeApi {
    authors: Mutex<Vec<Author>>,
    gates: Mutex<VecDeque<Gate>>,
    failure: Mutex<Option<ErrorInfo>>,
    list_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeApi {
    pub(crate) fn with_authors(count: u32) -> Arc<Self> {
        let api = Self::default();
        for i in 1..=count {
            api.insert(author(i, &format!("Author {i:03}")));
        }
        api.next_id.store(count as usize + 1000, Ordering::SeqCst);
        Arc::new(api)
    }

    pub(crate) fn insert(&self, author: Author) {
        self.authors.lock().unwrap().push(author);
    }

    pub(crate) fn authors(&self) -> Vec<Author> {
        self.authors.lock().unwrap().clone()
    }

    /// The next list/search call waits for the returned sender.
    pub(crate) fn gate(&self) -> oneshot::Sender<ApiResult<Page<Author>>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    /// The next call of any kind fails with `error`.
    pub(crate) fn fail_next(&self, error: ErrorInfo) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_for_list_calls(&self, count: usize) {
        while self.list_calls() < count {
            tokio::task::yield_now().await;
        }
    }

    fn take_failure(&self) -> ApiResult<()> {
        match self.failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn page(&self, term: Option<&str>, params: &Params<NameFilter>) -> ApiResult<Page<Author>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(ErrorInfo::new(ErrorKind::Unknown, 500, "gate dropped", "/authors")));
        }
        self.take_failure()?;

        let needle = term
            .or(params.filter.name.as_deref())
            .map(str::to_lowercase);
        let matching: Vec<Author> = self
            .authors()
            .into_iter()
            .filter(|a| match &needle {
                Some(needle) => a.name.to_lowercase().contains(needle),
                None => true,
            })
            .collect();

        let page = params.paging.page;
        let size = params.paging.size;
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip((page * size) as usize)
            .take(size as usize)
            .collect();
        Ok(Page::new(items, total, page, size))
    }
}

fn not_found(id: &str) -> ErrorInfo {
    ErrorInfo::new(
        ErrorKind::NotFound,
        404,
        format!("Author not found with id: {id}"),
        format!("/authors/{id}"),
    )
}

#[async_trait]
impl ResourceApi<Author> for FakeApi {
    async fn list(&self, params: &Params<NameFilter>) -> ApiResult<Page<Author>> {
        self.page(None, params).await
    }

    async fn get(&self, id: &str) -> ApiResult<Author> {
        self.take_failure()?;
        self.authors()
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found(id))
    }

    async fn create(&self, dto: &AuthorCreate) -> ApiResult<Author> {
        self.take_failure()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = Author {
            id: id.to_string(),
            name: dto.name.clone(),
            email: dto.email.clone(),
            biography: dto.biography.clone(),
            created_at: None,
            updated_at: None,
        };
        self.insert(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &str, dto: &AuthorCreate) -> ApiResult<Author> {
        self.take_failure()?;
        let mut authors = self.authors.lock().unwrap();
        let existing = authors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found(id))?;
        existing.name = dto.name.clone();
        existing.email = dto.email.clone();
        existing.biography = dto.biography.clone();
        Ok(existing.clone())
    }

    async fn delete(&self, id: &str) -> ApiResult<()> {
        self.take_failure()?;
        self.authors.lock().unwrap().retain(|a| a.id != id);
        Ok(())
    }

    async fn search(&self, query: &str, params: &Params<NameFilter>) -> ApiResult<Page<Author>> {
        self.page(Some(query), params).await
    }
}
