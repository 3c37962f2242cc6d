//! The text-generation service that translates text and suggests
//! replacement code for dynamic expressions.
//!
//! - `http`: JSON-over-HTTP adapter
//! - `queue`: rate limiting, retries, bounded concurrency and timeouts

mod http;
mod queue;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::classify::{CandidateId, CandidateKind};

pub use http::HttpOracle;
pub use queue::{OracleOutcome, OracleQueue, OracleStats, QueueSettings};

/// Placeholder for the allocated key inside a suggested replacement.
pub const KEY_PLACEHOLDER: &str = "$KEY";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    pub candidate: CandidateId,
    pub kind: CandidateKind,
    /// Path of the owning file.
    pub file: String,
    /// Raw text of a Simple candidate, or expression source of a Complex one.
    pub subject: String,
    /// Rendered context window (Complex only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Key already allocated for a Simple candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub source_locale: String,
    /// Locales that need translations.
    pub locales: Vec<String>,
    /// Keys known when the requests were built. Shared by every request.
    pub existing_keys: Arc<[String]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OracleResponse {
    /// Locale -> localized text.
    pub translations: BTreeMap<String, String>,
    /// Suggested code for a Complex candidate, containing [`KEY_PLACEHOLDER`].
    pub replacement: Option<String>,
    /// Source-locale text to store under the key, for Complex candidates.
    pub source_text: Option<String>,
    pub confidence: f64,
}

impl Default for OracleResponse {
    fn default() -> Self {
        Self {
            translations: BTreeMap::new(),
            replacement: None,
            source_text: None,
            confidence: 1.0,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("oracle returned HTTP {0}")]
    Status(u16),
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
    #[error("oracle call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl OracleError {
    /// Transport failures, timeouts, throttling and server errors are worth
    /// another attempt. A malformed answer is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Transport(_) | OracleError::Timeout(_) => true,
            OracleError::Status(status) => *status == 429 || *status >= 500,
            OracleError::InvalidResponse(_) => false,
        }
    }

    /// The service answered, even if the answer was an error.
    pub fn is_response(&self) -> bool {
        matches!(self, OracleError::Status(_) | OracleError::InvalidResponse(_))
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn consult(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError>;
}

/// Offline oracle: every locale gets the source text, nothing is suggested
/// for dynamic expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceOracle;

#[async_trait]
impl Oracle for SourceOracle {
    fn name(&self) -> &'static str {
        "source"
    }

    async fn consult(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let translations = match request.kind {
            CandidateKind::Simple => request
                .locales
                .iter()
                .map(|locale| (locale.clone(), request.subject.clone()))
                .collect(),
            CandidateKind::Complex => BTreeMap::new(),
        };
        Ok(OracleResponse {
            translations,
            ..Default::default()
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::*;

    type Script = dyn Fn(&OracleRequest) -> Result<OracleResponse, OracleError> + Send + Sync;

    /// Deterministic oracle driven by a closure.
    #[derive(Clone)]
    pub(crate) struct ScriptedOracle(Arc<Script>);

    impl ScriptedOracle {
        pub(crate) fn new(
            script: impl Fn(&OracleRequest) -> Result<OracleResponse, OracleError>
            + Send
            + Sync
            + 'static,
        ) -> Self {
            Self(Arc::new(script))
        }

        /// Prefixes every translation with the locale, and rewrites Complex
        /// candidates into a single lookup with the expression as source text.
        pub(crate) fn echo() -> Self {
            Self::new(|request| {
                let translations = request
                    .locales
                    .iter()
                    .map(|l| (l.clone(), format!("[{}] {}", l, request.subject)))
                    .collect();
                let (replacement, source_text) = match request.kind {
                    CandidateKind::Simple => (None, None),
                    CandidateKind::Complex => (
                        Some(format!("t('{}')", KEY_PLACEHOLDER)),
                        Some(request.subject.clone()),
                    ),
                };
                Ok(OracleResponse {
                    translations,
                    replacement,
                    source_text,
                    confidence: 0.9,
                })
            })
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn consult(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
            (self.0)(request)
        }
    }
}
