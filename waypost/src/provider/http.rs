//! HTTP client abstraction for testability.
//!
//! The [`HttpClient`] trait allows dependency injection of the network
//! layer, enabling mock clients in provider tests.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::types::ProviderError;

/// User agent identifying waypost to external providers.
pub const DEFAULT_USER_AGENT: &str = concat!("waypost/", env!("CARGO_PKG_VERSION"));

/// Trait for asynchronous HTTP operations.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP POST with a form-encoded body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `form` - Form fields to encode as the request body
    ///
    /// # Returns
    ///
    /// The response body as bytes or an error. Non-success statuses are
    /// errors; a transport timeout maps to [`ProviderError::Timeout`].
    fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new client with the given request timeout.
    ///
    /// The timeout here bounds the whole HTTP exchange and should sit
    /// slightly above the query timeout embedded in the provider
    /// request, so the provider's own timeout answer arrives first.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Creates a new client with a 35 second timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(Duration::from_secs(35))
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new().expect("Failed to create default HTTP client")
    }
}

impl HttpClient for ReqwestClient {
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Vec<u8>, ProviderError> {
        let response = match self.client.post(url).form(form).send().await {
            Ok(resp) => {
                debug!(url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) if e.is_timeout() => {
                warn!(url, error = %e, "HTTP request timed out");
                return Err(ProviderError::Timeout);
            }
            Err(e) => {
                warn!(url, error = %e, is_connect = e.is_connect(), "HTTP request failed");
                return Err(ProviderError::Http(format!("Request failed: {}", e)));
            }
        };

        if !response.status().is_success() {
            return Err(ProviderError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response.bytes().await.map(|b| b.to_vec()).map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Http(format!("Failed to read response: {}", e))
            }
        })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock HTTP client for testing.
    pub struct MockHttpClient {
        pub response: Result<Vec<u8>, ProviderError>,
        pub calls: AtomicUsize,
    }

    impl MockHttpClient {
        pub fn new(response: Result<Vec<u8>, ProviderError>) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl HttpClient for MockHttpClient {
        async fn post_form(
            &self,
            _url: &str,
            _form: &[(&str, &str)],
        ) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockHttpClient::new(Ok(vec![1, 2, 3, 4]));

        let result = mock.post_form("http://example.com", &[("data", "x")]).await;
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let mock = MockHttpClient::new(Err(ProviderError::Timeout));

        let result = mock.post_form("http://example.com", &[]).await;
        assert_eq!(result.unwrap_err(), ProviderError::Timeout);
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(DEFAULT_USER_AGENT.starts_with("waypost/"));
    }
}
