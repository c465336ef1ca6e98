//! In-process provider that replays queued responses.
//!
//! Responses are served in call order, regardless of the requested page.
//! Once the queue is drained every call returns an empty batch. Used for
//! offline replays (see `replay_file` in the engine config) and tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    CandidateCompany, DiscoveryProvider, DiscoveryRequest, DiscoveryResponse, ProvenanceSource,
};
use crate::error::{ConfigError, ProviderError};

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Page(DiscoveryResponse),
    Failure(ProviderError),
}

#[derive(Debug, Deserialize)]
struct ReplayScript {
    #[serde(default)]
    pages: Vec<ReplayPage>,
}

#[derive(Debug, Deserialize)]
struct ReplayPage {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    response: DiscoveryResponse,
}

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<DiscoveryRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call wait `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Loads a replay script: `{"pages": [{"companies": [..], "sources": [..]}, {"error": ".."}]}`.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let script: ReplayScript = serde_json::from_str(content)?;
        let provider = Self::new();
        for page in script.pages {
            match page.error {
                Some(message) => provider.push_failure(ProviderError::Request(message)),
                None => provider.push_response(page.response),
            }
        }
        Ok(provider)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    pub fn push_response(&self, response: DiscoveryResponse) {
        self.push(ScriptedResponse::Page(response));
    }

    pub fn push_page(&self, companies: Vec<CandidateCompany>, sources: Vec<ProvenanceSource>) {
        self.push_response(DiscoveryResponse::new(companies, sources));
    }

    pub fn push_empty(&self) {
        self.push_response(DiscoveryResponse::default());
    }

    pub fn push_failure(&self, error: ProviderError) {
        self.push(ScriptedResponse::Failure(error));
    }

    fn push(&self, response: ScriptedResponse) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(response);
        }
    }

    /// Number of queued responses not yet served.
    pub fn pending(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<DiscoveryRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests().iter().map(|r| r.page).collect()
    }
}

#[async_trait]
impl DiscoveryProvider for ScriptedProvider {
    async fn discover(
        &self,
        request: &DiscoveryRequest,
    ) -> Result<DiscoveryResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match next {
            Some(ScriptedResponse::Page(response)) => Ok(response),
            Some(ScriptedResponse::Failure(error)) => Err(error),
            None => Ok(DiscoveryResponse::default()),
        }
    }
}
