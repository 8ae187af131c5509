//! Per-kind list state and its request lifecycle.
//!
//! A [`ListController`] owns the list view state of one resource kind: the
//! desired query, the last adopted page, and the loading/error status.
//! Requests are tagged with a sequence number when issued. A completed
//! response is adopted only if no newer request has completed first, so a
//! slow response for superseded parameters never overwrites a fresher page.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bookkeep_core::{is_allowed_page_size, ErrorInfo, ErrorKind, Page, Params, Resource, PAGE_SIZES};
use tokio::sync::watch;
use tracing::debug;

use crate::client::{plural, ApiResult, ResourceApi};
use crate::mutation::MutationCoordinator;

/// Lifecycle of the list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Nothing fetched yet.
    Idle,
    /// A list or search request is unresolved.
    Loading,
    /// The last adopted request succeeded.
    Loaded,
    /// The last adopted request failed.
    Failed,
}

/// What the view renders for one resource kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<R> {
    pub items: Vec<R>,
    /// Resource opened through [`ListController::load`].
    pub selected: Option<R>,
    /// True while any request of this kind is unresolved.
    pub loading: bool,
    pub error: Option<ErrorInfo>,
    pub total_pages: u32,
    pub total_elements: u64,
    pub current_page: u32,
    pub page_size: u32,
}

impl<R> ListState<R> {
    fn new(page: u32, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            selected: None,
            loading: false,
            error: None,
            total_pages: 0,
            total_elements: 0,
            current_page: page,
            page_size,
        }
    }
}

/// A list query: plain listing or search by the resource's search key.
#[derive(Debug, Clone, PartialEq)]
pub enum Query<F> {
    List(Params<F>),
    Search { term: String, params: Params<F> },
}

impl<F> Query<F> {
    pub fn params(&self) -> &Params<F> {
        match self {
            Query::List(params) => params,
            Query::Search { params, .. } => params,
        }
    }

    /// Same kind of query with different parameters.
    pub(crate) fn with_params(&self, params: Params<F>) -> Self {
        match self {
            Query::List(_) => Query::List(params),
            Query::Search { term, .. } => Query::Search {
                term: term.clone(),
                params,
            },
        }
    }
}

/// How a fetch request ended for the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The response (data or error) was written to the state.
    Applied,
    /// The query equals the last issued one; no request was sent.
    Unchanged,
    /// A newer request completed first; the response was discarded.
    Stale,
    /// The controller was closed before the response arrived.
    Cancelled,
}

pub(crate) struct Tracker<R: Resource> {
    pub(crate) state: ListState<R>,
    pub(crate) query: Query<R::Filter>,
    last_issued: Option<Query<R::Filter>>,
    next_seq: u64,
    adopted_seq: u64,
    in_flight: usize,
    fetching: usize,
    settled: Status,
    closed: bool,
}

impl<R: Resource> Tracker<R> {
    /// Marks a request as started and returns its sequence number.
    pub(crate) fn begin(&mut self) -> u64 {
        self.next_seq += 1;
        self.in_flight += 1;
        self.state.loading = true;
        self.state.error = None;
        self.next_seq
    }

    pub(crate) fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.state.loading = self.in_flight > 0;
    }

    /// Records `seq` as the latest completed request. Returns `false` if a
    /// newer one already completed.
    pub(crate) fn adopt(&mut self, seq: u64) -> bool {
        if seq < self.adopted_seq {
            return false;
        }
        self.adopted_seq = seq;
        true
    }

    fn apply_page(&mut self, page: Page<R>) {
        self.state.items = page.items;
        self.state.total_pages = page.total_pages;
        self.state.total_elements = page.total_elements;
        self.state.current_page = page.page_index;
    }
}

struct Shared<R: Resource> {
    api: Arc<dyn ResourceApi<R>>,
    tracker: Mutex<Tracker<R>>,
    shutdown: watch::Sender<bool>,
}

/// List state controller for resource kind `R`.
///
/// Cheap to clone; clones share the same state.
pub struct ListController<R: Resource> {
    shared: Arc<Shared<R>>,
}

impl<R: Resource> Clone for ListController<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: Resource> ListController<R> {
    /// Creates an idle controller. Nothing is fetched until the first
    /// parameter change or [`refresh`](Self::refresh).
    pub fn new(api: Arc<dyn ResourceApi<R>>, params: Params<R::Filter>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let state = ListState::new(params.paging.page, params.paging.size);
        Self {
            shared: Arc::new(Shared {
                api,
                tracker: Mutex::new(Tracker {
                    state,
                    query: Query::List(params),
                    last_issued: None,
                    next_seq: 0,
                    adopted_seq: 0,
                    in_flight: 0,
                    fetching: 0,
                    settled: Status::Idle,
                    closed: false,
                }),
                shutdown,
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ListState<R> {
        self.tracker().state.clone()
    }

    pub fn status(&self) -> Status {
        let tracker = self.tracker();
        if tracker.fetching > 0 {
            Status::Loading
        } else {
            tracker.settled
        }
    }

    /// The parameters of the current query.
    pub fn params(&self) -> Params<R::Filter> {
        self.tracker().query.params().clone()
    }

    pub fn query(&self) -> Query<R::Filter> {
        self.tracker().query.clone()
    }

    /// Coordinator for create/update/delete on this kind.
    pub fn mutations(&self) -> MutationCoordinator<R> {
        MutationCoordinator::new(self.clone())
    }

    /// Replaces the query parameters and fetches if they differ from the
    /// last issued query.
    ///
    /// A page size outside [`PAGE_SIZES`] is rejected before any request.
    /// Changing the page size always moves back to page 0.
    pub async fn set_params(&self, params: Params<R::Filter>) -> Result<FetchOutcome, ErrorInfo> {
        self.apply(params, true).await
    }

    /// Fetches exactly the page `params` asks for, at its page size.
    ///
    /// Unlike [`set_params`](Self::set_params), a page size change keeps the
    /// requested page. For callers that know the page they want up front.
    pub async fn open_page(&self, params: Params<R::Filter>) -> Result<FetchOutcome, ErrorInfo> {
        self.apply(params, false).await
    }

    async fn apply(&self, params: Params<R::Filter>, reset_on_resize: bool) -> Result<FetchOutcome, ErrorInfo> {
        let mut params = params;
        let size = params.paging.size;
        if !is_allowed_page_size(size) {
            return Err(ErrorInfo::new(
                ErrorKind::ValidationFailed,
                400,
                format!("Unsupported page size {size}; expected one of {PAGE_SIZES:?}"),
                R::COLLECTION,
            ));
        }

        let query = {
            let tracker = self.tracker();
            if reset_on_resize && size != tracker.query.params().paging.size {
                params.paging.page = 0;
            }
            let query = tracker.query.with_params(params);
            if tracker.last_issued.as_ref() == Some(&query) {
                return Ok(FetchOutcome::Unchanged);
            }
            query
        };

        Ok(self.issue(query).await)
    }

    pub async fn set_page(&self, page: u32) -> Result<FetchOutcome, ErrorInfo> {
        self.set_params(self.params().with_page(page)).await
    }

    pub async fn set_page_size(&self, size: u32) -> Result<FetchOutcome, ErrorInfo> {
        self.set_params(self.params().with_size(size)).await
    }

    /// Replaces the filter and returns to page 0.
    pub async fn set_filter(&self, filter: R::Filter) -> Result<FetchOutcome, ErrorInfo> {
        self.set_params(self.params().with_filter(filter).with_page(0))
            .await
    }

    /// Switches to searching for `term` from page 0. An empty term goes
    /// back to plain listing.
    pub async fn search(&self, term: &str) -> FetchOutcome {
        let query = {
            let tracker = self.tracker();
            let params = tracker.query.params().clone().with_page(0);
            let term = term.trim();
            let query = if term.is_empty() {
                Query::List(params)
            } else {
                Query::Search {
                    term: term.to_string(),
                    params,
                }
            };
            if tracker.last_issued.as_ref() == Some(&query) {
                return FetchOutcome::Unchanged;
            }
            query
        };

        self.issue(query).await
    }

    /// Fetches the current query again, even if it was already issued.
    pub async fn refresh(&self) -> FetchOutcome {
        let query = self.query();
        self.issue(query).await
    }

    /// Fetches one resource into `selected`.
    pub async fn load(&self, id: &str) -> ApiResult<R> {
        self.begin_request().ok_or_else(|| cancelled::<R>("load"))?;

        let api = Arc::clone(&self.shared.api);
        let result = self.until_closed(api.get(id)).await;

        let mut tracker = self.tracker();
        tracker.finish();
        match result {
            None => Err(cancelled::<R>("load")),
            Some(Ok(resource)) => {
                tracker.state.selected = Some(resource.clone());
                Ok(resource)
            }
            Some(Err(e)) => {
                tracker.state.error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn clear_error(&self) {
        self.tracker().state.error = None;
    }

    pub fn clear_selected(&self) {
        self.tracker().state.selected = None;
    }

    /// Tears the controller down: in-flight requests are abandoned and no
    /// further state changes happen.
    pub fn close(&self) {
        {
            let mut tracker = self.tracker();
            if tracker.closed {
                return;
            }
            tracker.closed = true;
        }
        self.shared.shutdown.send_replace(true);
        debug!("{} controller closed", R::NAME);
    }

    pub fn is_closed(&self) -> bool {
        self.tracker().closed
    }

    /// Sends `query` unconditionally and adopts its response unless a newer
    /// request completed first.
    pub(crate) async fn issue(&self, query: Query<R::Filter>) -> FetchOutcome {
        let seq = {
            let mut tracker = self.tracker();
            if tracker.closed {
                return FetchOutcome::Cancelled;
            }
            tracker.state.page_size = query.params().paging.size;
            tracker.query = query.clone();
            tracker.last_issued = Some(query.clone());
            tracker.fetching += 1;
            tracker.begin()
        };
        debug!("{} request #{} issued: {:?}", plural::<R>(), seq, query);

        let api = Arc::clone(&self.shared.api);
        let request = async move {
            match &query {
                Query::List(params) => api.list(params).await,
                Query::Search { term, params } => api.search(term, params).await,
            }
        };
        let result = self.until_closed(request).await;

        let mut tracker = self.tracker();
        tracker.finish();
        tracker.fetching = tracker.fetching.saturating_sub(1);

        let Some(result) = result else {
            return FetchOutcome::Cancelled;
        };
        if tracker.closed {
            return FetchOutcome::Cancelled;
        }
        if !tracker.adopt(seq) {
            debug!("{} request #{} superseded, response discarded", plural::<R>(), seq);
            return FetchOutcome::Stale;
        }

        match result {
            Ok(page) => {
                tracker.apply_page(page);
                tracker.settled = Status::Loaded;
            }
            Err(e) => {
                // Previous items stay so the last good page remains visible.
                tracker.state.error = Some(e);
                tracker.settled = Status::Failed;
            }
        }
        FetchOutcome::Applied
    }

    /// Starts a non-list request. `None` once closed.
    pub(crate) fn begin_request(&self) -> Option<u64> {
        let mut tracker = self.tracker();
        if tracker.closed {
            return None;
        }
        Some(tracker.begin())
    }

    pub(crate) fn api(&self) -> Arc<dyn ResourceApi<R>> {
        Arc::clone(&self.shared.api)
    }

    /// Runs `fut` unless the controller is closed first.
    pub(crate) async fn until_closed<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        let mut shutdown = self.shared.shutdown.subscribe();
        tokio::select! {
            value = fut => Some(value),
            _ = shutdown.wait_for(|closed| *closed) => None,
        }
    }

    pub(crate) fn tracker(&self) -> MutexGuard<'_, Tracker<R>> {
        self.shared
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Error reported for a request abandoned at teardown.
pub(crate) fn cancelled<R: Resource>(operation: &str) -> ErrorInfo {
    ErrorInfo::new(
        ErrorKind::NetworkFailure,
        0,
        format!("Cancelled {operation} of {}: controller closed", R::NAME),
        R::COLLECTION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{author, FakeApi};
    use bookkeep_core::{Author, NameFilter};

    fn controller(api: &Arc<FakeApi>) -> ListController<Author> {
        ListController::new(api.clone(), Params::default())
    }

    #[tokio::test]
    async fn first_fetch_loads_page() {
        let api = FakeApi::with_authors(25);
        let list = controller(&api);
        assert_eq!(list.status(), Status::Idle);

        let outcome = list.refresh().await;

        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(list.status(), Status::Loaded);
        let state = list.state();
        assert_eq!(state.items.len(), 10);
        assert_eq!(state.total_elements, 25);
        assert_eq!(state.total_pages, 3);
        assert_eq!(state.current_page, 0);
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn equal_params_do_not_refetch() {
        let api = FakeApi::with_authors(25);
        let list = controller(&api);

        assert_eq!(list.set_params(Params::default()).await.unwrap(), FetchOutcome::Applied);
        assert_eq!(list.set_params(Params::default()).await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(list.set_page(0).await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(api.list_calls(), 1);

        assert_eq!(list.set_page(1).await.unwrap(), FetchOutcome::Applied);
        assert_eq!(list.set_page(1).await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(api.list_calls(), 2);

        // A fresh but value-equal params object is still unchanged.
        let rebuilt = Params::<NameFilter>::default().with_page(1);
        assert_eq!(list.set_params(rebuilt).await.unwrap(), FetchOutcome::Unchanged);
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn page_size_change_resets_page() {
        let api = FakeApi::with_authors(120);
        let list = controller(&api);
        list.set_page(4).await.unwrap();
        assert_eq!(list.state().current_page, 4);

        list.set_page_size(20).await.unwrap();
        assert_eq!(list.state().current_page, 0);
        assert_eq!(list.state().page_size, 20);

        // Even when the caller asks for a page alongside the new size.
        list.set_page(3).await.unwrap();
        let mut resized = list.params();
        resized.paging.size = 50;
        list.set_params(resized).await.unwrap();
        assert_eq!(list.params().paging.page, 0);
        assert_eq!(list.state().current_page, 0);
    }

    #[tokio::test]
    async fn open_page_keeps_page_with_new_size() {
        let api = FakeApi::with_authors(100);
        let list = controller(&api);

        let params = Params::<NameFilter>::default().with_size(20).with_page(2);
        assert_eq!(list.open_page(params).await.unwrap(), FetchOutcome::Applied);

        let state = list.state();
        assert_eq!(state.current_page, 2);
        assert_eq!(state.page_size, 20);
        assert_eq!(state.items.len(), 20);
        assert_eq!(state.items[0].name, "Author 041");
        assert_eq!(list.params().paging.page, 2);

        let err = list
            .open_page(Params::default().with_size(15))
            .await
            .unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::ValidationFailed);
        assert_eq!(api.list_calls(), 1);
    }

    #[tokio::test]
    async fn rejects_unsupported_page_size() {
        let api = FakeApi::with_authors(3);
        let list = controller(&api);

        let err = list.set_page_size(7).await.unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::ValidationFailed);
        assert_eq!(api.list_calls(), 0);
        assert_eq!(list.status(), Status::Idle);
    }

    #[tokio::test]
    async fn failure_keeps_previous_items() {
        let api = FakeApi::with_authors(15);
        let list = controller(&api);
        list.refresh().await;
        let before = list.state().items;

        api.fail_next(ErrorInfo::new(ErrorKind::ServerError, 500, "boom", "/authors"));
        list.set_page(1).await.unwrap();

        let state = list.state();
        assert_eq!(list.status(), Status::Failed);
        assert_eq!(state.items, before);
        assert_eq!(state.error.as_ref().map(|e| e.message.as_str()), Some("boom"));
        assert!(!state.loading);

        // Retrying clears the error on entry and loads the page.
        list.refresh().await;
        let state = list.state();
        assert!(state.error.is_none());
        assert_eq!(state.current_page, 1);
        assert_eq!(list.status(), Status::Loaded);
    }

    #[tokio::test]
    async fn late_response_for_older_params_is_discarded() {
        let api = FakeApi::with_authors(40);
        let list = controller(&api);
        let gate_a = api.gate();
        let gate_b = api.gate();

        let first = list.clone();
        let a = tokio::spawn(async move { first.set_page(1).await });
        api.wait_for_list_calls(1).await;

        let second = list.clone();
        let b = tokio::spawn(async move { second.set_page(2).await });
        api.wait_for_list_calls(2).await;
        assert!(list.state().loading);
        assert_eq!(list.status(), Status::Loading);

        gate_b.send(Ok(Page::new(vec![author(21, "B")], 40, 2, 10))).unwrap();
        assert_eq!(b.await.unwrap().unwrap(), FetchOutcome::Applied);
        assert!(list.state().loading);

        gate_a.send(Ok(Page::new(vec![author(11, "A")], 40, 1, 10))).unwrap();
        assert_eq!(a.await.unwrap().unwrap(), FetchOutcome::Stale);

        let state = list.state();
        assert_eq!(state.current_page, 2);
        assert_eq!(state.items[0].name, "B");
        assert!(!state.loading);
        assert_eq!(list.status(), Status::Loaded);
    }

    #[tokio::test]
    async fn in_order_completion_applies_both() {
        let api = FakeApi::with_authors(40);
        let list = controller(&api);
        let gate_a = api.gate();
        let gate_b = api.gate();

        let first = list.clone();
        let a = tokio::spawn(async move { first.set_page(1).await });
        api.wait_for_list_calls(1).await;
        let second = list.clone();
        let b = tokio::spawn(async move { second.set_page(2).await });
        api.wait_for_list_calls(2).await;

        gate_a.send(Ok(Page::new(vec![author(11, "A")], 40, 1, 10))).unwrap();
        assert_eq!(a.await.unwrap().unwrap(), FetchOutcome::Applied);
        gate_b.send(Ok(Page::new(vec![author(21, "B")], 40, 2, 10))).unwrap();
        assert_eq!(b.await.unwrap().unwrap(), FetchOutcome::Applied);

        assert_eq!(list.state().items[0].name, "B");
    }

    #[tokio::test]
    async fn close_cancels_in_flight_request() {
        let api = FakeApi::with_authors(5);
        let list = controller(&api);
        let _gate = api.gate();

        let pending = list.clone();
        let task = tokio::spawn(async move { pending.refresh().await });
        api.wait_for_list_calls(1).await;

        list.close();

        assert_eq!(task.await.unwrap(), FetchOutcome::Cancelled);
        assert!(list.state().items.is_empty());
        assert!(!list.state().loading);
        assert_eq!(list.refresh().await, FetchOutcome::Cancelled);
    }

    #[tokio::test]
    async fn search_uses_term_and_keeps_it_across_pages() {
        let api = FakeApi::with_authors(0);
        for i in 1..=12 {
            api.insert(author(i, &format!("Ada {i}")));
        }
        api.insert(author(99, "Grace"));
        let list = controller(&api);

        assert_eq!(list.search("ada").await, FetchOutcome::Applied);
        assert_eq!(list.state().total_elements, 12);
        assert_eq!(list.search("ada").await, FetchOutcome::Unchanged);

        list.set_page(1).await.unwrap();
        let state = list.state();
        assert_eq!(state.items.len(), 2);
        assert!(matches!(list.query(), Query::Search { ref term, .. } if term == "ada"));

        list.search("  ").await;
        assert!(matches!(list.query(), Query::List(_)));
        assert_eq!(list.state().total_elements, 13);
    }

    #[tokio::test]
    async fn load_sets_selected_or_error() {
        let api = FakeApi::with_authors(3);
        let list = controller(&api);

        let found = list.load("2").await.unwrap();
        assert_eq!(list.state().selected, Some(found));

        let err = list.load("404").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(list.state().error.map(|e| e.status_code), Some(404));

        list.clear_error();
        list.clear_selected();
        let state = list.state();
        assert!(state.error.is_none());
        assert!(state.selected.is_none());
    }
}
