//! Object-safe wrapper over [`Provider`], so a member can hold a
//! heterogeneous `Arc<dyn DynProvider>` regardless of the concrete
//! provider (or gateway-decorated provider) behind it.
//!
//! `ugudu_types::Provider` uses RPITIT and isn't dyn-compatible. Any
//! `T: Provider` gets a [`DynProvider`] blanket implementation for free —
//! including `ugudu_gateway::Gateway<P>`, which itself implements
//! `Provider`.

use async_trait::async_trait;
use ugudu_types::{CompletionRequest, CompletionResponse, Provider, ProviderError};

/// Object-safe stand-in for [`Provider::complete`].
#[async_trait]
pub trait DynProvider: Send + Sync {
    /// Send a completion request and await the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;
}

#[async_trait]
impl<T> DynProvider for T
where
    T: Provider,
{
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        Provider::complete(self, request).await
    }
}
