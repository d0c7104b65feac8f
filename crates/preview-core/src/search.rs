use std::sync::Arc;

use preview_proto::protocol::{SearchStatus, TrackRecord};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::catalog::CatalogProvider;
use crate::error::{CatalogError, SessionError};
use crate::index::TrackIndex;

/// Posted by a search worker when its catalog call finishes, whatever the
/// result.  Applied on the session core's turn, never on the worker.
#[derive(Debug, Clone)]
pub struct SearchCompletion {
    pub seq: u64,
    pub query: String,
    pub outcome: Result<Vec<TrackRecord>, CatalogError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Index replaced with `count` titles.
    Applied { count: usize },
    /// Provider matched nothing; the index is now empty.
    NoResults,
    /// Provider unreachable; index untouched.
    NetworkUnavailable(String),
    /// A newer search was submitted meanwhile; result dropped.
    Stale,
}

/// Owns the `TrackIndex` and decides which search results may replace it.
///
/// Every `submit` bumps a sequence number; only the completion carrying the
/// latest one is applied.  The in-flight counter drops by one for every
/// completion so the busy indicator clears exactly once per submission.
pub struct SearchCoordinator {
    catalog: Arc<dyn CatalogProvider>,
    index: TrackIndex,
    latest_seq: u64,
    in_flight: usize,
    cancel_superseded: bool,
    worker: Option<AbortHandle>,
    query: String,
    status: SearchStatus,
    error: Option<String>,
}

impl SearchCoordinator {
    pub fn new(catalog: Arc<dyn CatalogProvider>, cancel_superseded: bool) -> Self {
        Self {
            catalog,
            index: TrackIndex::new(),
            latest_seq: 0,
            in_flight: 0,
            cancel_superseded,
            worker: None,
            query: String::new(),
            status: SearchStatus::Idle,
            error: None,
        }
    }

    pub fn index(&self) -> &TrackIndex {
        &self.index
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Start a catalog search for `query` on a worker task.  The worker's
    /// `SearchCompletion` is delivered through `completions`.
    pub fn submit<T>(&mut self, query: String, completions: mpsc::Sender<T>) -> u64
    where
        T: From<SearchCompletion> + Send + 'static,
    {
        self.latest_seq += 1;
        self.in_flight += 1;
        self.query = query.clone();
        self.status = SearchStatus::InFlight;
        self.error = None;

        let seq = self.latest_seq;
        info!("SearchCoordinator: submit seq={} query={:?}", seq, query);

        let catalog = Arc::clone(&self.catalog);
        let artist = query.clone();
        let search = tokio::spawn(async move { catalog.search(&artist).await });
        let abort = search.abort_handle();

        tokio::spawn(async move {
            let outcome = match search.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(CatalogError::Cancelled),
                Err(e) => Err(CatalogError::Unexpected(format!(
                    "search worker failed: {}",
                    e
                ))),
            };
            let completion = SearchCompletion {
                seq,
                query,
                outcome,
            };
            if completions.send(completion.into()).await.is_err() {
                debug!("SearchCoordinator: session gone, dropping result seq={}", seq);
            }
        });

        if let Some(previous) = self.worker.replace(abort) {
            if self.cancel_superseded {
                debug!("SearchCoordinator: cancelling superseded worker");
                previous.abort();
            }
        }

        seq
    }

    /// Apply a worker's result if it is still the latest one.
    pub fn complete(
        &mut self,
        completion: SearchCompletion,
    ) -> Result<SearchOutcome, SessionError> {
        self.in_flight = self.in_flight.saturating_sub(1);

        let SearchCompletion {
            seq,
            query,
            outcome,
        } = completion;

        if seq != self.latest_seq {
            match &outcome {
                Err(CatalogError::Unexpected(reason)) => warn!(
                    "SearchCoordinator: discarding stale failure seq={} query={:?}: {}",
                    seq, query, reason
                ),
                _ => debug!(
                    "SearchCoordinator: stale result seq={} (latest {})",
                    seq, self.latest_seq
                ),
            }
            return Ok(SearchOutcome::Stale);
        }
        self.worker = None;

        match outcome {
            Ok(records) => {
                self.index.replace_all(records);
                self.status = SearchStatus::Succeeded;
                if self.index.is_empty() {
                    info!("SearchCoordinator: no tracks for {:?}", query);
                    Ok(SearchOutcome::NoResults)
                } else {
                    info!(
                        "SearchCoordinator: {} tracks for {:?}",
                        self.index.len(),
                        query
                    );
                    Ok(SearchOutcome::Applied {
                        count: self.index.len(),
                    })
                }
            }
            Err(CatalogError::Network(reason)) => {
                warn!("SearchCoordinator: network failure for {:?}: {}", query, reason);
                self.status = SearchStatus::Failed;
                self.error = Some(reason.clone());
                Ok(SearchOutcome::NetworkUnavailable(reason))
            }
            Err(CatalogError::Cancelled) => {
                // Only happens when the session itself tore the worker down.
                debug!("SearchCoordinator: latest search cancelled");
                self.status = SearchStatus::Idle;
                Ok(SearchOutcome::Stale)
            }
            Err(CatalogError::Unexpected(reason)) => {
                self.status = SearchStatus::Failed;
                self.error = Some(reason.clone());
                Err(SessionError::UnexpectedProviderFailure { query, reason })
            }
        }
    }

    /// Abort the running worker, if any.
    pub fn cancel_pending(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
