//! AI chat-completion adapters.
//!
//! Every supported vendor speaks the OpenAI chat-completions protocol, so a
//! single [`OpenAiCompatibleClient`] serves them all with a vendor-specific
//! default base URL. Adapters are looked up by [`AiVendor`] in an
//! [`AiRegistry`]; tests register scripted adapters instead.

pub mod openai;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::config::AiVendor;
use crate::processor::ReceiptImage;

pub use openai::OpenAiCompatibleClient;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("No AI adapter registered for vendor '{}'", .0.as_str())]
    UnsupportedVendor(AiVendor),

    #[error("Endpoint URL required for vendor '{}'", .0.as_str())]
    MissingEndpoint(AiVendor),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("AI endpoint returned {status}")]
    Status { status: u16, body: String },

    #[error("Response contained no completion")]
    EmptyResponse { body: String },

    #[error("Credential unavailable: {0}")]
    Credential(String),
}

impl AiError {
    /// Raw response body, when the endpoint sent one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AiError::Status { body, .. } | AiError::EmptyResponse { body } => Some(body),
            _ => None,
        }
    }
}

/// One chat-completion call.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    /// Attached for vision models only.
    pub image: Option<&'a ReceiptImage>,
    pub credential: Option<&'a SecretString>,
    pub model: &'a str,
    pub endpoint: Option<&'a str>,
}

/// Produces the raw completion text for a rendered prompt.
pub trait AiAdapter: Send + Sync {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AiError>;
}

/// AI adapters keyed by vendor.
#[derive(Clone, Default)]
pub struct AiRegistry {
    adapters: HashMap<AiVendor, Arc<dyn AiAdapter>>,
}

impl AiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an HTTP client for every vendor.
    pub fn with_defaults(timeout: Duration) -> Result<Self, AiError> {
        let mut registry = Self::new();
        for vendor in [
            AiVendor::OpenAi,
            AiVendor::Gemini,
            AiVendor::OpenAiCustom,
            AiVendor::Ollama,
        ] {
            registry.register(vendor, Arc::new(OpenAiCompatibleClient::new(vendor, timeout)?));
        }
        Ok(registry)
    }

    pub fn register(&mut self, vendor: AiVendor, adapter: Arc<dyn AiAdapter>) {
        self.adapters.insert(vendor, adapter);
    }

    pub fn get(&self, vendor: AiVendor) -> Result<Arc<dyn AiAdapter>, AiError> {
        self.adapters
            .get(&vendor)
            .cloned()
            .ok_or(AiError::UnsupportedVendor(vendor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl AiAdapter for Echo {
        fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AiError> {
            Ok(format!("{}:{}", request.model, request.prompt))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = AiRegistry::new();
        registry.register(AiVendor::Gemini, Arc::new(Echo));

        let request = CompletionRequest {
            prompt: "hi",
            image: None,
            credential: None,
            model: "flash",
            endpoint: None,
        };
        let adapter = registry.get(AiVendor::Gemini).unwrap();
        assert_eq!(adapter.complete(&request).unwrap(), "flash:hi");

        assert!(matches!(
            registry.get(AiVendor::OpenAi),
            Err(AiError::UnsupportedVendor(AiVendor::OpenAi))
        ));
    }

    #[test]
    fn test_defaults_cover_all_vendors() {
        let registry = AiRegistry::with_defaults(Duration::from_secs(5)).unwrap();
        for vendor in [
            AiVendor::OpenAi,
            AiVendor::Gemini,
            AiVendor::OpenAiCustom,
            AiVendor::Ollama,
        ] {
            assert!(registry.get(vendor).is_ok());
        }
    }

    #[test]
    fn test_raw_response_only_for_http_bodies() {
        let err = AiError::Status {
            status: 500,
            body: "{\"error\":\"overloaded\"}".to_string(),
        };
        assert_eq!(err.raw_response(), Some("{\"error\":\"overloaded\"}"));
        assert_eq!(AiError::Timeout(3).raw_response(), None);
        assert_eq!(AiError::Timeout(3).to_string(), "Request timed out after 3s");
    }
}
