//! Classification client for labelling window titles.
//!
//! Titles are sent to a local Ollama-style `/api/generate` endpoint which
//! answers with a single category word. Classification never fails from the
//! caller's point of view: every transport or decoding problem is folded
//! into [`Category::Error`] so the segment can still be recorded.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default generate endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemma3:4b";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Label used when out-of-set answers are coerced.
pub const UNCLASSIFIED: &str = "unclassified";

const ERROR_PREFIX: &str = "error: ";

/// Activity category attached to a finished segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Study,
    Work,
    Break,
    /// A label outside the closed set, kept verbatim
    Other(String),
    /// Classification failed; carries the cause
    Error(String),
}

impl Category {
    /// Map a raw service answer onto a category.
    ///
    /// Whitespace is trimmed and the closed set matches case-insensitively.
    /// An empty answer is treated as a malformed response, and so is an
    /// answer using the stored error prefix, which could not be told apart
    /// from a failure once written.
    pub fn from_response(raw: &str) -> Self {
        let token = raw.trim();
        if token.starts_with(ERROR_PREFIX) {
            return Category::Error(format!("reserved label in response: {token:?}"));
        }
        match token.to_lowercase().as_str() {
            "" => Category::Error("empty response".to_string()),
            "study" => Category::Study,
            "work" => Category::Work,
            "break" => Category::Break,
            _ => Category::Other(token.to_string()),
        }
    }

    /// Parse the stored column value.
    pub fn from_stored(value: &str) -> Self {
        match value.strip_prefix(ERROR_PREFIX) {
            Some(cause) => Category::Error(cause.to_string()),
            None => match value {
                "study" => Category::Study,
                "work" => Category::Work,
                "break" => Category::Break,
                other => Category::Other(other.to_string()),
            },
        }
    }

    /// Column value written to the store.
    pub fn as_stored(&self) -> String {
        match self {
            Category::Study => "study".to_string(),
            Category::Work => "work".to_string(),
            Category::Break => "break".to_string(),
            Category::Other(label) => label.clone(),
            Category::Error(cause) => format!("{ERROR_PREFIX}{cause}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Category::Error(_))
    }

    /// Whether the category is one of study, work or break.
    pub fn is_known(&self) -> bool {
        matches!(self, Category::Study | Category::Work | Category::Break)
    }

    /// Replace an out-of-set label with [`UNCLASSIFIED`].
    pub fn coerce_unknown(self) -> Self {
        match self {
            Category::Other(_) => Category::Other(UNCLASSIFIED.to_string()),
            other => other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_stored())
    }
}

impl Serialize for Category {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_stored())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Category::from_stored(&value))
    }
}

/// Anything that can label a window title.
pub trait Classifier {
    fn classify(&self, title: &str) -> Category;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&self, title: &str) -> Category {
        (**self).classify(title)
    }
}

/// Classification endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Full URL of the generate endpoint
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Request timeout
    #[serde(with = "crate::config::duration_serde")]
    pub timeout: Duration,
    /// Map labels outside study/work/break to "unclassified"
    #[serde(default)]
    pub coerce_unknown_categories: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            coerce_unknown_categories: false,
        }
    }
}

/// Classification client error types.
#[derive(Debug)]
pub enum ClassifierError {
    /// Client construction error
    Config(String),
    /// Request did not finish within the timeout
    Timeout,
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Body could not be decoded or lacked the answer
    Malformed(String),
}

impl std::fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifierError::Config(msg) => write!(f, "classifier config error: {msg}"),
            ClassifierError::Timeout => write!(f, "classification timed out"),
            ClassifierError::Network(msg) => write!(f, "connection error: {msg}"),
            ClassifierError::Server { status, message } => {
                write!(f, "server error ({status}): {message}")
            }
            ClassifierError::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<reqwest::Error> for ClassifierError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClassifierError::Timeout
        } else if e.is_decode() {
            ClassifierError::Malformed(e.to_string())
        } else {
            ClassifierError::Network(e.to_string())
        }
    }
}

/// Request body for the generate endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// The part of the generate response we read.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: Option<String>,
}

/// Build the instruction sent for a window title.
pub fn build_prompt(title: &str) -> String {
    format!(
        "Classify the following window title as one of [study, work, break]. \
         Answer with exactly one of those words and nothing else: '{title}'"
    )
}

/// Async HTTP client for the generate endpoint.
pub struct ClassifierClient {
    config: ClassifierConfig,
    client: reqwest::Client,
}

impl ClassifierClient {
    /// Create a new classification client.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClassifierError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Ask the service for the raw label of `title`.
    pub async fn request_label(&self, title: &str) -> Result<String, ClassifierError> {
        let body = GenerateRequest {
            model: self.config.model.clone(),
            prompt: build_prompt(title),
            stream: false,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClassifierError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        parsed
            .response
            .ok_or_else(|| ClassifierError::Malformed("missing 'response' field".to_string()))
    }

    /// Classify `title`, folding failures into [`Category::Error`].
    pub async fn classify(&self, title: &str) -> Category {
        let category = match self.request_label(title).await {
            Ok(raw) => Category::from_response(&raw),
            Err(e) => Category::Error(e.to_string()),
        };

        if self.config.coerce_unknown_categories {
            category.coerce_unknown()
        } else {
            category
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

/// Blocking classification client for the synchronous agent loop.
pub struct BlockingClassifier {
    inner: ClassifierClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingClassifier {
    /// Create a new blocking classification client.
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ClassifierError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: ClassifierClient::new(config)?,
            runtime,
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        self.inner.config()
    }
}

impl Classifier for BlockingClassifier {
    fn classify(&self, title: &str) -> Category {
        let category = self.runtime.block_on(self.inner.classify(title));
        if let Category::Error(cause) = &category {
            tracing::warn!(title, "classification failed: {cause}");
        }
        category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_closed_set() {
        assert_eq!(Category::from_response("work"), Category::Work);
        assert_eq!(Category::from_response("  Study\n"), Category::Study);
        assert_eq!(Category::from_response("BREAK"), Category::Break);
    }

    #[test]
    fn test_from_response_keeps_unknown_verbatim() {
        assert_eq!(
            Category::from_response(" Gaming \n"),
            Category::Other("Gaming".to_string())
        );
        assert!(Category::from_response("   ").is_error());
    }

    #[test]
    fn test_error_prefix_label_is_not_kept_verbatim() {
        let category = Category::from_response("error: gpu offline");
        assert!(category.is_error());

        // Whatever is stored reads back as the same category.
        assert_eq!(Category::from_stored(&category.as_stored()), category);

        // Without the separator the label is an ordinary out-of-set token.
        assert_eq!(
            Category::from_response("error"),
            Category::Other("error".to_string())
        );
    }

    #[test]
    fn test_stored_form() {
        let categories = [
            Category::Study,
            Category::Work,
            Category::Break,
            Category::Other("meeting".to_string()),
            Category::Error("connection refused".to_string()),
        ];
        for category in categories {
            assert_eq!(Category::from_stored(&category.as_stored()), category);
        }
        assert_eq!(
            Category::Error("timed out".to_string()).as_stored(),
            "error: timed out"
        );
    }

    #[test]
    fn test_coerce_unknown() {
        assert_eq!(
            Category::Other("gaming".to_string()).coerce_unknown(),
            Category::Other(UNCLASSIFIED.to_string())
        );
        assert_eq!(Category::Work.coerce_unknown(), Category::Work);
        assert!(Category::Error("x".to_string()).coerce_unknown().is_error());
    }

    #[test]
    fn test_prompt_embeds_title() {
        let prompt = build_prompt("Rust Book - Chapter 4");
        assert!(prompt.contains("'Rust Book - Chapter 4'"));
        assert!(prompt.contains("study, work, break"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: DEFAULT_MODEL.to_string(),
            prompt: "p".to_string(),
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gemma3:4b");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_default_config() {
        let config = ClassifierConfig::default();
        assert_eq!(config.endpoint, "http://localhost:11434/api/generate");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.coerce_unknown_categories);
    }

    #[test]
    fn test_unreachable_endpoint_yields_error_category() {
        let config = ClassifierConfig {
            endpoint: "http://127.0.0.1:9/api/generate".to_string(),
            timeout: Duration::from_secs(2),
            ..ClassifierConfig::default()
        };
        let classifier = BlockingClassifier::new(config).unwrap();
        assert!(classifier.classify("Terminal").is_error());
    }
}
