//! Gemini Live model implementation.

use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::model::RealtimeModel;
use crate::session::BoxedSession;
use async_trait::async_trait;
use secrecy::SecretString;
use url::Url;

use super::session::GeminiRealtimeSession;
use super::{DEFAULT_MODEL, GEMINI_LIVE_URL};

/// Gemini Live model for creating realtime sessions.
///
/// # Example
///
/// ```rust,ignore
/// use barista_realtime::gemini::GeminiRealtimeModel;
/// use barista_realtime::RealtimeModel;
///
/// let model = GeminiRealtimeModel::new(api_key, "models/gemini-live-2.5-flash-preview")?;
/// let session = model.connect(config).await?;
/// ```
#[derive(Debug)]
pub struct GeminiRealtimeModel {
    api_key: SecretString,
    model_id: String,
    endpoint: Url,
}

impl GeminiRealtimeModel {
    /// Create a new Gemini Live model against the public endpoint.
    pub fn new(api_key: SecretString, model_id: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(api_key, model_id, GEMINI_LIVE_URL)
    }

    /// Create with the default Live model.
    pub fn with_default_model(api_key: SecretString) -> Result<Self> {
        Self::new(api_key, DEFAULT_MODEL)
    }

    /// Create against a custom WebSocket endpoint.
    pub fn with_endpoint(
        api_key: SecretString,
        model_id: impl Into<String>,
        endpoint: &str,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| RealtimeError::config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(RealtimeError::config(format!(
                "Endpoint must use ws or wss, got '{}'",
                endpoint.scheme()
            )));
        }
        Ok(Self { api_key, model_id: normalize_model(model_id.into()), endpoint })
    }

    /// The WebSocket endpoint, without credentials.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// The Live API expects the `models/` prefix.
fn normalize_model(model_id: String) -> String {
    if model_id.starts_with("models/") { model_id } else { format!("models/{}", model_id) }
}

#[async_trait]
impl RealtimeModel for GeminiRealtimeModel {
    fn provider(&self) -> &str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession> {
        let session =
            GeminiRealtimeSession::connect(&self.endpoint, &self.api_key, &self.model_id, config)
                .await?;

        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("test-key".to_string())
    }

    #[test]
    fn test_model_prefix() {
        let model = GeminiRealtimeModel::new(key(), "gemini-live-test").unwrap();
        assert_eq!(model.model_id(), "models/gemini-live-test");

        let model = GeminiRealtimeModel::new(key(), "models/already").unwrap();
        assert_eq!(model.model_id(), "models/already");
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(GeminiRealtimeModel::with_endpoint(key(), "m", "ws://127.0.0.1:9000/live").is_ok());
        assert!(GeminiRealtimeModel::with_endpoint(key(), "m", "https://example.com").is_err());
        assert!(GeminiRealtimeModel::with_endpoint(key(), "m", "not a url").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let model = GeminiRealtimeModel::with_default_model(key()).unwrap();
        assert!(!format!("{:?}", model).contains("test-key"));
    }
}
