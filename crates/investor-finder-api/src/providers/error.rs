use thiserror::Error;

use super::ProviderKind;

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("{provider} is not configured: {message}")]
    Configuration { provider: String, message: String },

    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status { provider: String, status: u16, body: String },

    #[error("{provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    #[error("{provider} response could not be parsed: {message}")]
    Parse { provider: String, message: String },

    #[error("{provider} has not been initialized")]
    NotInitialized { provider: String },
}

impl ProviderError {
    pub fn configuration(provider: &str, message: impl Into<String>) -> Self {
        Self::Configuration { provider: provider.to_string(), message: message.into() }
    }

    pub fn request(provider: &str, message: impl ToString) -> Self {
        Self::Request { provider: provider.to_string(), message: message.to_string() }
    }

    pub fn parse(provider: &str, message: impl ToString) -> Self {
        Self::Parse { provider: provider.to_string(), message: message.to_string() }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Consumes a non-2xx response into a status error.
    pub async fn from_response(provider: &str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Status { provider: provider.to_string(), status, body }
    }
}

#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("{kind} provider '{name}' not found. Available: {}", format_available(.available))]
    NotFound {
        kind: ProviderKind,
        name: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Construction(#[from] ProviderError),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_lists_available() {
        let err = RegistryError::NotFound {
            kind: ProviderKind::Llm,
            name: "unknown".to_string(),
            available: vec!["gemini".to_string(), "openai".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "llm provider 'unknown' not found. Available: gemini, openai"
        );
    }

    #[test]
    fn test_not_found_with_empty_registry() {
        let err = RegistryError::NotFound {
            kind: ProviderKind::Scraper,
            name: "x".to_string(),
            available: vec![],
        };
        assert!(err.to_string().ends_with("Available: none"));
    }
}
