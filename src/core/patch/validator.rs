use std::path::Path;

use crate::core::parsers::jsx::parse_jsx_source;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub diagnostics: Vec<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn invalid(diagnostic: impl Into<String>) -> Self {
        Self {
            valid: false,
            diagnostics: vec![diagnostic.into()],
        }
    }
}

/// Checks a rewritten file before it is written.
pub trait Validator: Send + Sync {
    fn validate(&self, path: &Path, content: &str) -> Validation;
}

/// Re-parses the rewritten content with the same syntax used for scanning.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwcValidator;

impl Validator for SwcValidator {
    fn validate(&self, path: &Path, content: &str) -> Validation {
        match parse_jsx_source(content, path) {
            Ok(_) => Validation::ok(),
            Err(e) => Validation::invalid(format!("{:#}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tsx() {
        let validation = SwcValidator.validate(
            Path::new("App.tsx"),
            "export const App = () => <p>{t('hello')}</p>;",
        );
        assert!(validation.valid);
    }

    #[test]
    fn test_broken_markup_is_invalid() {
        let validation = SwcValidator.validate(Path::new("App.tsx"), "const A = () => <p>{t('x'}</p>;");
        assert!(!validation.valid);
        assert_eq!(validation.diagnostics.len(), 1);
    }
}
