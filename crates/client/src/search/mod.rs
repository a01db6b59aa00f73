//! Paginated retrieval over listing endpoints.
//!
//! Two strategies, both yielding plain items as a [`Stream`]:
//!
//! * [`search`] walks pages one at a time, lazily, and never fetches more
//!   than the consumer demands. Page order is preserved.
//! * [`search_in_background`] fetches the first page to learn the total,
//!   then issues every remaining page fetch concurrently (bounded by the
//!   session's dispatch queue) and yields items in *arrival* order. Faster
//!   on large result sets, unordered by design.
//!
//! The expected total comes from the first page's reserved `items` count;
//! both strategies stop once that many items have been yielded. The
//! sequential walk additionally stops soft after
//! [`SEARCH_MAX_EMPTY_PAGES`](crate::constants::SEARCH_MAX_EMPTY_PAGES)
//! consecutive zero-item pages, which guards against a backend that keeps
//! promising more items than its pages deliver.

mod envelope;

pub use envelope::ListPage;

use std::collections::VecDeque;
use std::sync::Arc;

use agentbox_common::Result;
use futures::{stream, Stream};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::constants::{PAGE_SIZE, SEARCH_MAX_EMPTY_PAGES};
use crate::session::Session;
use crate::types::RequestParameters;

struct SequentialState<'a> {
    session: &'a Session,
    path: String,
    params: RequestParameters,
    buffer: VecDeque<Value>,
    next_page: u64,
    expected: Option<u64>,
    yielded: u64,
    empty_streak: u32,
    done: bool,
}

/// Lazy page-by-page retrieval. See the module docs.
pub(crate) fn search(
    session: &Session,
    path: String,
    params: RequestParameters,
) -> impl Stream<Item = Result<Value>> + '_ {
    let state = SequentialState {
        session,
        path,
        params,
        buffer: VecDeque::new(),
        next_page: 1,
        expected: None,
        yielded: 0,
        empty_streak: 0,
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            if let Some(item) = state.buffer.pop_front() {
                state.yielded += 1;
                return Some((Ok(item), state));
            }
            if let Some(expected) = state.expected {
                if state.yielded >= expected {
                    return None;
                }
            }
            if state.empty_streak >= SEARCH_MAX_EMPTY_PAGES {
                warn!(path = %state.path, empty_pages = state.empty_streak,
                    "listing keeps returning empty pages, stopping early");
                return None;
            }

            let page_index = state.next_page;
            state.next_page += 1;
            match state.session.fetch_list_page(&state.path, &state.params, page_index).await {
                Ok(page) => {
                    if state.expected.is_none() {
                        debug!(path = %state.path, total = page.total, "listing total established");
                        state.expected = Some(page.total);
                    }
                    if page.items.is_empty() {
                        state.empty_streak += 1;
                    } else {
                        state.empty_streak = 0;
                        state.buffer.extend(page.items);
                    }
                }
                Err(err) => {
                    // A failed page fetch ends the retrieval; the error is
                    // the stream's final element.
                    state.done = true;
                    return Some((Err(err), state));
                }
            }
        }
    })
}

enum Background {
    Init { session: Arc<Session>, path: String, params: RequestParameters },
    Drain(DrainState),
    Done,
}

struct DrainState {
    rx: mpsc::UnboundedReceiver<Result<Vec<Value>>>,
    buffer: VecDeque<Value>,
    expected: u64,
    yielded: u64,
}

/// Speculative whole-set retrieval. See the module docs.
pub(crate) fn search_in_background(
    session: Arc<Session>,
    path: String,
    params: RequestParameters,
) -> impl Stream<Item = Result<Value>> + Send + 'static {
    stream::unfold(Background::Init { session, path, params }, |phase| async move {
        match phase {
            Background::Init { session, path, params } => {
                let first = match session.fetch_list_page(&path, &params, 1).await {
                    Ok(page) => page,
                    Err(err) => return Some((Err(err), Background::Done)),
                };
                let expected = first.total;
                let total_pages = expected.div_ceil(PAGE_SIZE).max(1);
                debug!(%path, total = expected, pages = total_pages,
                    "scheduling speculative page fetches");

                let (tx, rx) = mpsc::unbounded_channel();
                for page_index in 2..=total_pages {
                    let session = Arc::clone(&session);
                    let path = path.clone();
                    let params = params.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let outcome = session
                            .fetch_list_page(&path, &params, page_index)
                            .await
                            .map(|page| page.items);
                        // The receiver is gone when the consumer stopped
                        // early; nothing to do with the page then.
                        let _ = tx.send(outcome);
                    });
                }
                drop(tx);

                let state =
                    DrainState { rx, buffer: first.items.into(), expected, yielded: 0 };
                drain(state).await
            }
            Background::Drain(state) => drain(state).await,
            Background::Done => None,
        }
    })
}

async fn drain(mut state: DrainState) -> Option<(Result<Value>, Background)> {
    loop {
        if state.yielded >= state.expected {
            return None;
        }
        if let Some(item) = state.buffer.pop_front() {
            state.yielded += 1;
            return Some((Ok(item), Background::Drain(state)));
        }
        match state.rx.recv().await {
            Some(Ok(items)) => state.buffer.extend(items),
            Some(Err(err)) => return Some((Err(err), Background::Done)),
            // Every page task has reported; the backend delivered fewer
            // items than the first page promised.
            None => {
                warn!(yielded = state.yielded, expected = state.expected,
                    "listing delivered fewer items than promised");
                return None;
            }
        }
    }
}
