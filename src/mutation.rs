//! Create, update, and delete with local state reconciliation.
//!
//! Mutations share the `loading` flag of their resource kind. A successful
//! mutation also counts as the most recent completion, so list responses
//! issued before it and arriving after it are discarded instead of undoing
//! the change.

use bookkeep_core::{total_pages, ErrorInfo, Resource};
use tracing::debug;

use crate::client::ApiResult;
use crate::controller::{cancelled, ListController};

/// Mutation entry point for one resource kind.
pub struct MutationCoordinator<R: Resource> {
    list: ListController<R>,
}

impl<R: Resource> Clone for MutationCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
        }
    }
}

impl<R: Resource> MutationCoordinator<R> {
    pub fn new(list: ListController<R>) -> Self {
        Self { list }
    }

    /// Creates a resource.
    ///
    /// The new resource is appended to the local page right away, then the
    /// current query is fetched again: a local append ignores sort order and
    /// page boundaries.
    pub async fn create(&self, dto: &R::Create) -> ApiResult<R> {
        let seq = self.list.begin_request().ok_or_else(|| cancelled::<R>("create"))?;
        let api = self.list.api();
        let result = self.list.until_closed(api.create(dto)).await;

        let created = {
            let mut tracker = self.list.tracker();
            tracker.finish();
            let created = settle::<R, _>(result, &mut tracker.state.error, "create")?;
            tracker.adopt(seq);
            tracker.state.items.push(created.clone());
            tracker.state.total_elements += 1;
            tracker.state.total_pages =
                total_pages(tracker.state.total_elements, tracker.state.page_size);
            created
        };
        debug!("created {} {}", R::NAME, created.id());

        self.list.refresh().await;
        Ok(created)
    }

    /// Replaces a resource; the matching list item and selection follow.
    pub async fn update(&self, id: &str, dto: &R::Create) -> ApiResult<R> {
        let seq = self.list.begin_request().ok_or_else(|| cancelled::<R>("update"))?;
        let api = self.list.api();
        let result = self.list.until_closed(api.update(id, dto)).await;

        let mut tracker = self.list.tracker();
        tracker.finish();
        let updated = settle::<R, _>(result, &mut tracker.state.error, "update")?;
        tracker.adopt(seq);

        if let Some(item) = tracker
            .state
            .items
            .iter_mut()
            .find(|item| item.id() == updated.id())
        {
            *item = updated.clone();
        }
        if let Some(selected) = tracker.state.selected.as_mut() {
            if selected.id() == updated.id() {
                *selected = updated.clone();
            }
        }
        Ok(updated)
    }

    /// Deletes a resource and removes it locally.
    ///
    /// When that empties the page, the page index is clamped to the last
    /// remaining page and the list is fetched again.
    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let seq = self.list.begin_request().ok_or_else(|| cancelled::<R>("delete"))?;
        let api = self.list.api();
        let result = self.list.until_closed(api.delete(id)).await;

        let refetch = {
            let mut tracker = self.list.tracker();
            tracker.finish();
            settle::<R, _>(result, &mut tracker.state.error, "delete")?;
            tracker.adopt(seq);

            let page = {
                let state = &mut tracker.state;
                let before = state.items.len();
                state.items.retain(|item| item.id() != id);
                if state.items.len() < before {
                    state.total_elements = state.total_elements.saturating_sub(1);
                    state.total_pages = total_pages(state.total_elements, state.page_size);
                }
                if state.selected.as_ref().is_some_and(|s| s.id() == id) {
                    state.selected = None;
                }

                if state.items.is_empty() && (state.current_page > 0 || state.total_elements > 0) {
                    let page = state
                        .current_page
                        .min(state.total_pages.saturating_sub(1));
                    state.current_page = page;
                    Some(page)
                } else {
                    None
                }
            };
            page.map(|page| {
                let params = tracker.query.params().clone().with_page(page);
                tracker.query.with_params(params)
            })
        };
        debug!("deleted {} {}", R::NAME, id);

        if let Some(query) = refetch {
            self.list.issue(query).await;
        }
        Ok(())
    }
}

/// Unwraps a mutation result, recording failures in the state.
fn settle<R: Resource, T>(
    result: Option<ApiResult<T>>,
    error: &mut Option<ErrorInfo>,
    operation: &str,
) -> ApiResult<T> {
    match result {
        None => Err(cancelled::<R>(operation)),
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => {
            *error = Some(e.clone());
            Err(e)
        }
    }
}
