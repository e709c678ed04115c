//! Interfaces to external services.
//!
//! Content generation, authentication and the remote object store live
//! outside this crate; only their contracts are defined here.

pub mod connectivity;
pub mod s3;

use async_trait::async_trait;
use wordcard_core::failure::ProviderError;
use wordcard_core::types::AnalysisResult;

pub use connectivity::{AlwaysOnline, HttpConnectivity};
pub use s3::S3RemoteStore;

/// Generates the structured analysis for a word.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, word: &str) -> Result<AnalysisResult, ProviderError>;
}

/// Renders an illustration for a word.
#[async_trait]
pub trait ImageRenderer: Send + Sync {
    async fn render_image(&self, subject: &str, prompt: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Opaque credential returned by an [`Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

/// Whether an authentication call may prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Interactive,
    Silent,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, mode: AuthMode) -> Result<AuthToken, ProviderError>;
}

/// Object listed by a [`RemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub id: String,
    pub name: String,
}

/// Minimal object store holding the backup document.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(&self, token: &AuthToken) -> Result<Vec<RemoteObject>, ProviderError>;
    async fn get(&self, token: &AuthToken, id: &str) -> Result<Vec<u8>, ProviderError>;
    /// Create a named object and return its id.
    async fn create(
        &self,
        token: &AuthToken,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ProviderError>;
    async fn update(&self, token: &AuthToken, id: &str, bytes: Vec<u8>)
        -> Result<(), ProviderError>;
}

/// Reports whether the network is reachable.
#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}
