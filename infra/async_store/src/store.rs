use std::sync::Arc;

use domain::models::{FetchParams, Fingerprint};
use domain::providers::ProviderError;
use domain::types::CancellationToken;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::hooks::{HookContext, StateSetter, StoreHooks};
use crate::registry::RegisteredStore;
use crate::{SharedProvider, StoreState};

/// How a call to [`AsyncStore::fetch`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new state was published.
    Performed,
    /// The effective params match the last applied ones.
    Unchanged,
    /// A request for the same effective params is already in flight.
    AlreadyPending,
    /// The request was cancelled, superseded before it settled, or timed out.
    Cancelled,
    /// The request settled after a newer one had taken over; its result was discarded.
    Superseded,
    /// The provider failed; the error was published on the error channel.
    Failed,
}

impl FetchOutcome {
    pub const fn performed(self) -> bool {
        matches!(self, Self::Performed)
    }
}

pub struct StoreOptions<R> {
    /// Params of the first fetch. Without an initial state, the store
    /// dispatches a forced fetch with them on construction.
    pub fetch_params: Option<FetchParams>,
    pub initial_state: Option<R>,
    /// Laid under the params of every fetch.
    pub default_fetch_params: FetchParams,
    pub hooks: StoreHooks<R>,
}

impl<R> Default for StoreOptions<R> {
    fn default() -> Self {
        Self {
            fetch_params: None,
            initial_state: None,
            default_fetch_params: FetchParams::default(),
            hooks: StoreHooks::default(),
        }
    }
}

struct InFlight {
    id: u64,
    fingerprint: Fingerprint,
    cancellation: CancellationToken,
}

struct Bookkeeping<R: Send + Sync + 'static> {
    provider: SharedProvider<R>,
    current_params: Option<FetchParams>,
    applied_fingerprint: Option<Fingerprint>,
    in_flight: Option<InFlight>,
    next_request_id: u64,
    /// Initial fetch of a store built outside a Tokio runtime.
    deferred_fetch: Option<FetchParams>,
}

impl<R: Send + Sync + 'static> Bookkeeping<R> {
    fn is_current(&self, request_id: u64) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.id == request_id)
    }

    /// Why a non-forced fetch with `fingerprint` would do nothing, if it would.
    fn skip_reason(&self, fingerprint: &Fingerprint, force: bool) -> Option<FetchOutcome> {
        if force {
            None
        } else if self.applied_fingerprint.as_ref() == Some(fingerprint) {
            Some(FetchOutcome::Unchanged)
        } else if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| &in_flight.fingerprint == fingerprint)
        {
            Some(FetchOutcome::AlreadyPending)
        } else {
            None
        }
    }
}

struct Inner<R: Send + Sync + 'static> {
    default_fetch_params: FetchParams,
    hooks: StoreHooks<R>,
    state: watch::Sender<StoreState<R>>,
    is_loading: watch::Sender<bool>,
    pending: watch::Sender<Option<FetchParams>>,
    error: watch::Sender<Option<ProviderError>>,
    bookkeeping: Mutex<Bookkeeping<R>>,
}

impl<R: Send + Sync + 'static> Inner<R> {
    /// Clears the loading flag and pending marker if `request_id` is still
    /// the current request.
    fn finish(&self, request_id: u64) {
        let mut bookkeeping = self.bookkeeping.lock();
        if bookkeeping.is_current(request_id) {
            bookkeeping.in_flight = None;
            self.clear_loading();
        }
    }

    fn clear_loading(&self) {
        self.is_loading
            .send_if_modified(|loading| std::mem::replace(loading, false));
        self.pending.send_if_modified(|pending| pending.take().is_some());
    }
}

/// Observable wrapper around a [`DataProvider`](domain::providers::DataProvider).
///
/// A store owns the last resolved record, a loading flag, the pending
/// marker and the last error, each published on its own `watch` channel.
/// At most one request is current at any time: dispatching a fetch cancels
/// the one in flight, and a request that is no longer current never
/// touches the published channels.
///
/// Clones share the same store.
pub struct AsyncStore<R: Send + Sync + 'static> {
    inner: Arc<Inner<R>>,
}

impl<R: Send + Sync + 'static> Clone for AsyncStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum Dispatch<R: Send + Sync + 'static> {
    Started(Request<R>),
    Skipped(FetchOutcome),
}

impl<R: Send + Sync + 'static> AsyncStore<R> {
    /// Builds a store. When `options.fetch_params` is given without an
    /// initial state, a forced fetch is dispatched on the current Tokio
    /// runtime before this returns, so the loading flag is already set.
    /// Outside a runtime that fetch is deferred to the first `fetch` call.
    pub fn new(provider: SharedProvider<R>, options: StoreOptions<R>) -> Self {
        let StoreOptions {
            fetch_params,
            initial_state,
            default_fetch_params,
            hooks,
        } = options;

        let needs_initial_fetch = initial_state.is_none();
        let applied_fingerprint = fetch_params
            .as_ref()
            .map(|params| params.merged_over(&default_fetch_params).fingerprint());

        let store = Self {
            inner: Arc::new(Inner {
                default_fetch_params,
                hooks,
                state: watch::channel(initial_state.map(Arc::new)).0,
                is_loading: watch::channel(false).0,
                pending: watch::channel(None).0,
                error: watch::channel(None).0,
                bookkeeping: Mutex::new(Bookkeeping {
                    provider,
                    current_params: fetch_params.clone(),
                    applied_fingerprint,
                    in_flight: None,
                    next_request_id: 0,
                    deferred_fetch: None,
                }),
            }),
        };

        if let Some(hook) = &store.inner.hooks.on_initialized {
            let state = store.state();
            hook(HookContext {
                state: &state,
                fetch_params: fetch_params.as_ref(),
                default_fetch_params: &store.inner.default_fetch_params,
                set: StateSetter::new(&store.inner.state),
            });
        }

        if needs_initial_fetch {
            if let Some(params) = fetch_params {
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        if let Dispatch::Started(request) = store.dispatch(params, true, None) {
                            runtime.spawn(request.run());
                        }
                    }
                    Err(_) => {
                        tracing::debug!("no runtime, deferring the initial fetch");
                        store.inner.bookkeeping.lock().deferred_fetch = Some(params);
                    }
                }
            }
        }

        store
    }

    pub async fn fetch(&self, params: FetchParams, force: bool) -> FetchOutcome {
        self.fetch_with_provider(params, force, None).await
    }

    /// Like [`fetch`](Self::fetch), but resolves through `provider` instead
    /// of the store's current provider when one is given.
    #[tracing::instrument(skip(self, provider))]
    pub async fn fetch_with_provider(
        &self,
        params: FetchParams,
        force: bool,
        provider: Option<SharedProvider<R>>,
    ) -> FetchOutcome {
        let deferred = self.inner.bookkeeping.lock().deferred_fetch.take();
        if let Some(initial_params) = deferred {
            if let Dispatch::Started(request) = self.dispatch(initial_params, true, None) {
                let outcome = request.run().await;
                tracing::debug!(?outcome, "deferred initial fetch settled");
            }
        }

        match self.dispatch(params, force, provider) {
            Dispatch::Started(request) => request.run().await,
            Dispatch::Skipped(outcome) => {
                tracing::debug!(?outcome, "fetch skipped");
                outcome
            }
        }
    }

    /// Everything a fetch does before it suspends on the provider.
    fn dispatch(
        &self,
        params: FetchParams,
        force: bool,
        provider: Option<SharedProvider<R>>,
    ) -> Dispatch<R> {
        let inner = &self.inner;
        let final_params = params.merged_over(&inner.default_fetch_params);
        let fingerprint = final_params.fingerprint();
        let cancellation = CancellationToken::new();

        if let Some(outcome) = inner.bookkeeping.lock().skip_reason(&fingerprint, force) {
            return Dispatch::Skipped(outcome);
        }

        let marker = match &inner.hooks.on_set_pending {
            Some(hook) => hook(&params, &cancellation),
            None => params.clone(),
        };

        let (id, provider) = {
            let mut bookkeeping = inner.bookkeeping.lock();

            // another dispatch may have run while the hook did
            if let Some(outcome) = bookkeeping.skip_reason(&fingerprint, force) {
                return Dispatch::Skipped(outcome);
            }

            if let Some(superseded) = bookkeeping.in_flight.take() {
                tracing::debug!(request_id = superseded.id, "cancelling superseded request");
                superseded.cancellation.cancel();
            }

            let id = bookkeeping.next_request_id;
            bookkeeping.next_request_id += 1;
            bookkeeping.in_flight = Some(InFlight {
                id,
                fingerprint: fingerprint.clone(),
                cancellation: cancellation.clone(),
            });

            inner.error.send_if_modified(|error| error.take().is_some());
            inner
                .is_loading
                .send_if_modified(|loading| !std::mem::replace(loading, true));
            inner.pending.send_replace(Some(marker));

            let provider = provider.unwrap_or_else(|| Arc::clone(&bookkeeping.provider));
            (id, provider)
        };

        Dispatch::Started(Request {
            inner: Arc::clone(inner),
            id,
            params,
            final_params,
            fingerprint,
            cancellation,
            provider,
            settled: false,
        })
    }

    pub fn state(&self) -> StoreState<R> {
        self.inner.state.borrow().clone()
    }

    /// Explicit params of the last applied fetch (or of construction).
    pub fn params(&self) -> Option<FetchParams> {
        self.inner.bookkeeping.lock().current_params.clone()
    }

    pub fn provider(&self) -> SharedProvider<R> {
        Arc::clone(&self.inner.bookkeeping.lock().provider)
    }

    /// Swaps the provider used by subsequent fetches; a request already in
    /// flight keeps the provider it started with.
    pub fn set_provider(&self, provider: SharedProvider<R>) {
        self.inner.bookkeeping.lock().provider = provider;
    }

    pub fn is_loading(&self) -> bool {
        *self.inner.is_loading.borrow()
    }

    pub fn pending(&self) -> Option<FetchParams> {
        self.inner.pending.borrow().clone()
    }

    pub fn error(&self) -> Option<ProviderError> {
        self.inner.error.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState<R>> {
        self.inner.state.subscribe()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.inner.is_loading.subscribe()
    }

    pub fn subscribe_pending(&self) -> watch::Receiver<Option<FetchParams>> {
        self.inner.pending.subscribe()
    }

    pub fn subscribe_error(&self) -> watch::Receiver<Option<ProviderError>> {
        self.inner.error.subscribe()
    }
}

impl<R: Send + Sync + 'static> RegisteredStore for AsyncStore<R> {
    /// Cancels the request in flight and releases the provider.
    fn teardown(&self) {
        let provider = {
            let mut bookkeeping = self.inner.bookkeeping.lock();
            bookkeeping.deferred_fetch = None;
            if let Some(in_flight) = bookkeeping.in_flight.take() {
                in_flight.cancellation.cancel();
                self.inner.clear_loading();
            }
            Arc::clone(&bookkeeping.provider)
        };

        tracing::debug!(provider = provider.provider_type(), "tearing down store");
        provider.destroy();
    }
}

/// A dispatched fetch. Dropping it before it settles cancels its token;
/// dropping it in any case runs the finally step.
struct Request<R: Send + Sync + 'static> {
    inner: Arc<Inner<R>>,
    id: u64,
    params: FetchParams,
    final_params: FetchParams,
    fingerprint: Fingerprint,
    cancellation: CancellationToken,
    provider: SharedProvider<R>,
    settled: bool,
}

impl<R: Send + Sync + 'static> Request<R> {
    async fn run(mut self) -> FetchOutcome {
        let result = self
            .cancellation
            .run_until_cancelled(
                self.provider
                    .get_processed(&self.final_params, &self.cancellation),
            )
            .await
            .unwrap_or(Err(ProviderError::Cancelled));

        self.settled = true;

        match result {
            Ok(record) => self.apply(record),
            Err(error) => self.fail(error),
        }
    }

    fn is_current(&self) -> bool {
        self.inner.bookkeeping.lock().is_current(self.id)
    }

    fn apply(&self, record: Option<R>) -> FetchOutcome {
        let inner = &self.inner;
        if !self.is_current() {
            tracing::debug!(request_id = self.id, "discarding result of superseded request");
            return FetchOutcome::Superseded;
        }

        let state = record.map(Arc::new);
        let state = match &inner.hooks.on_before_state_change {
            Some(hook) => hook(state),
            None => state,
        };

        {
            let mut bookkeeping = inner.bookkeeping.lock();
            if !bookkeeping.is_current(self.id) {
                tracing::debug!(request_id = self.id, "discarding result of superseded request");
                return FetchOutcome::Superseded;
            }

            bookkeeping.current_params = Some(self.params.clone());
            bookkeeping.applied_fingerprint = Some(self.fingerprint.clone());
            inner.state.send_replace(state);
        }

        if let Some(hook) = &inner.hooks.on_after_state_change {
            let state = inner.state.borrow().clone();
            hook(HookContext {
                state: &state,
                fetch_params: Some(&self.params),
                default_fetch_params: &inner.default_fetch_params,
                set: StateSetter::new(&inner.state),
            });
        }

        FetchOutcome::Performed
    }

    fn fail(&self, error: ProviderError) -> FetchOutcome {
        if error == ProviderError::Timeout {
            // consumers sharing the token stop as well
            self.cancellation.cancel();
        }

        if error.is_cancellation() {
            tracing::debug!(request_id = self.id, %error, "request cancelled");
            return FetchOutcome::Cancelled;
        }

        if !self.is_current() {
            tracing::debug!(request_id = self.id, %error, "discarding failure of superseded request");
            return FetchOutcome::Superseded;
        }

        tracing::warn!(
            request_id = self.id,
            provider = self.provider.provider_type(),
            %error,
            "fetch failed"
        );

        let inner = &self.inner;
        let error = match &inner.hooks.on_error {
            Some(hook) => hook(error),
            None => error,
        };

        let bookkeeping = inner.bookkeeping.lock();
        if !bookkeeping.is_current(self.id) {
            return FetchOutcome::Superseded;
        }
        inner.error.send_replace(Some(error));

        FetchOutcome::Failed
    }
}

impl<R: Send + Sync + 'static> Drop for Request<R> {
    fn drop(&mut self) {
        if !self.settled {
            self.cancellation.cancel();
        }
        self.inner.finish(self.id);
    }
}
