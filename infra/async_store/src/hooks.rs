use std::sync::Arc;

use domain::models::FetchParams;
use domain::providers::ProviderError;
use domain::types::CancellationToken;
use tokio::sync::watch;

use crate::StoreState;

type ContextHook<R> = Box<dyn Fn(HookContext<'_, R>) + Send + Sync>;
type StateTransform<R> = Box<dyn Fn(StoreState<R>) -> StoreState<R> + Send + Sync>;
type PendingTransform = Box<dyn Fn(&FetchParams, &CancellationToken) -> FetchParams + Send + Sync>;
type ErrorTransform = Box<dyn Fn(ProviderError) -> ProviderError + Send + Sync>;

/// Optional callbacks invoked at fixed points of a store's fetch cycle.
///
/// Hooks run without any store lock held, but they must not await; they are
/// plain functions called inline by the store.
pub struct StoreHooks<R> {
    /// Once, from the constructor, after the state channel exists and
    /// before the automatic initial fetch (if any) is dispatched. Receives
    /// the constructor's fetch params.
    pub on_initialized: Option<ContextHook<R>>,
    /// On every successful resolution, before the record is published.
    /// Whatever it returns is what subscribers see.
    pub on_before_state_change: Option<StateTransform<R>>,
    /// After a successful resolution has been published and before the
    /// loading flag is cleared. Receives the explicit params of the fetch
    /// that produced the state.
    pub on_after_state_change: Option<ContextHook<R>>,
    /// When a fetch is dispatched; maps its explicit params (and its
    /// cancellation token) to the value published on the pending channel.
    pub on_set_pending: Option<PendingTransform>,
    /// When a fetch fails with a non-cancellation error; maps the error to
    /// the value published on the error channel.
    pub on_error: Option<ErrorTransform>,
}

impl<R> Default for StoreHooks<R> {
    fn default() -> Self {
        Self {
            on_initialized: None,
            on_before_state_change: None,
            on_after_state_change: None,
            on_set_pending: None,
            on_error: None,
        }
    }
}

impl<R> StoreHooks<R> {
    #[must_use]
    pub fn with_on_initialized(
        mut self,
        hook: impl Fn(HookContext<'_, R>) + Send + Sync + 'static,
    ) -> Self {
        self.on_initialized = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_on_before_state_change(
        mut self,
        hook: impl Fn(StoreState<R>) -> StoreState<R> + Send + Sync + 'static,
    ) -> Self {
        self.on_before_state_change = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_on_after_state_change(
        mut self,
        hook: impl Fn(HookContext<'_, R>) + Send + Sync + 'static,
    ) -> Self {
        self.on_after_state_change = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_on_set_pending(
        mut self,
        hook: impl Fn(&FetchParams, &CancellationToken) -> FetchParams + Send + Sync + 'static,
    ) -> Self {
        self.on_set_pending = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn with_on_error(
        mut self,
        hook: impl Fn(ProviderError) -> ProviderError + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// What `on_initialized` and `on_after_state_change` get to see.
pub struct HookContext<'a, R> {
    pub state: &'a StoreState<R>,
    pub fetch_params: Option<&'a FetchParams>,
    pub default_fetch_params: &'a FetchParams,
    pub set: StateSetter<'a, R>,
}

/// Replaces the published state from inside a hook.
pub struct StateSetter<'a, R> {
    sender: &'a watch::Sender<StoreState<R>>,
}

impl<'a, R> StateSetter<'a, R> {
    pub(crate) const fn new(sender: &'a watch::Sender<StoreState<R>>) -> Self {
        Self { sender }
    }

    pub fn set(&self, state: Option<R>) {
        self.sender.send_replace(state.map(Arc::new));
    }
}
