mod claude;
mod client;
mod credentials;
mod openai;
mod registry;

pub use claude::{ClaudeClient, ClaudeCodeClient};
pub use client::{CONNECT_TIMEOUT, REQUEST_TIMEOUT, SourceClient, http_client};
pub use credentials::{CredentialPaths, CredentialStore, FileCredentialStore};
pub use openai::OpenAiClient;
pub use registry::SourceRegistry;
