use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::models::FetchParams;
use domain::providers::{DataProvider, Priority, ProviderError};
use domain::types::CancellationToken;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

pub struct Call {
    pub cancellation: CancellationToken,
    /// Whether every earlier call's token was already cancelled when this
    /// call began.
    pub earlier_calls_cancelled: bool,
}

/// Resolves every fetch to the params it was called with, unless a canned
/// response is registered for the `playerId` param. With a gate, each call
/// waits for one `release` before answering.
pub struct ScriptedProvider {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<HashMap<String, Result<Value, ProviderError>>>,
    gate: Option<Notify>,
    destroyed: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            gate: None,
            destroyed: AtomicUsize::new(0),
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::new()
        }
    }

    pub fn respond_to(&self, player_id: &str, response: Result<Value, ProviderError>) {
        self.responses.lock().insert(player_id.to_owned(), response);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn with_call<T>(&self, index: usize, f: impl FnOnce(&Call) -> T) -> T {
        f(&self.calls.lock()[index])
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, count: usize) {
        for _ in 0..1000 {
            if self.call_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("provider was not called {count} times");
    }
}

#[async_trait::async_trait]
impl DataProvider for ScriptedProvider {
    type Record = FetchParams;

    fn provider_type(&self) -> &'static str {
        "scripted"
    }

    async fn get(
        &self,
        params: &FetchParams,
        cancellation: &CancellationToken,
        _priority: Priority,
    ) -> Result<Value, ProviderError> {
        {
            let mut calls = self.calls.lock();
            let earlier_calls_cancelled = calls.iter().all(|call| call.cancellation.is_cancelled());
            calls.push(Call {
                cancellation: cancellation.clone(),
                earlier_calls_cancelled,
            });
        }

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let canned = params
            .get_str("playerId")
            .and_then(|player_id| self.responses.lock().get(player_id).cloned());

        match canned {
            Some(response) => response,
            None => serde_json::to_value(params)
                .map_err(|error| ProviderError::InvalidResponse(error.to_string())),
        }
    }

    fn process(&self, response: Value) -> Option<FetchParams> {
        serde_json::from_value(response).ok()
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
