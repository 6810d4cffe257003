use std::collections::BTreeMap;
use std::sync::Arc;

use relay_core::Source;

use crate::claude::{ClaudeClient, ClaudeCodeClient};
use crate::client::{SourceClient, http_client};
use crate::credentials::FileCredentialStore;
use crate::openai::OpenAiClient;

/// Single dispatch point from a source to its client. The orchestrator never
/// branches on concrete providers; it only walks this registry.
#[derive(Default)]
pub struct SourceRegistry {
    clients: BTreeMap<Source, Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All production clients over one shared HTTP client.
    pub fn with_default_clients(credentials: Arc<FileCredentialStore>) -> reqwest::Result<Self> {
        let http = http_client()?;
        let mut registry = Self::new();
        registry.register(Arc::new(ClaudeClient::new(http.clone(), credentials.clone())));
        registry.register(Arc::new(ClaudeCodeClient::new(
            http.clone(),
            credentials.clone(),
        )));
        registry.register(Arc::new(OpenAiClient::new(http, credentials)));
        Ok(registry)
    }

    /// Registers a client, replacing any prior client for the same source.
    pub fn register(&mut self, client: Arc<dyn SourceClient>) {
        self.clients.insert(client.source(), client);
    }

    pub fn client(&self, source: Source) -> Option<Arc<dyn SourceClient>> {
        self.clients.get(&source).cloned()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.clients.keys().copied().collect()
    }
}
