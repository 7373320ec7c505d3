use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reader the generated explanation should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Beginner,
    Practitioner,
    Dba,
}

/// Options forwarded to the explanation producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NlOptions {
    /// Target audience.
    pub audience: Audience,
    /// Free-form style hint (e.g. `concise`).
    pub style: String,
    /// Soft length cap in sentences.
    pub length: usize,
}

impl Default for NlOptions {
    fn default() -> Self {
        Self {
            audience: Audience::Practitioner,
            style: "concise".to_string(),
            length: 4,
        }
    }
}

/// The producer is not configured or currently unreachable. Never fatal:
/// callers drop the explanation and keep every core field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlUnavailable;

/// Opaque natural-language producer consulted after core analysis.
#[async_trait]
pub trait ExplanationProducer: Send + Sync {
    /// Generate explanation text for a prompt, or report unavailability.
    async fn generate(&self, prompt: &str, opts: &NlOptions) -> Result<String, NlUnavailable>;
}
