//! Parsing error types for listing extraction
//!
//! Most of these are recoverable: the affected field falls back to a
//! placeholder and the listing is still emitted.

use thiserror::Error;
use tracing::Level;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Required field '{field}' not found in HTML")]
    RequiredFieldMissing {
        field: String,
        context: Option<String>,
    },

    #[error("Invalid CSS selector for {field}: {selector} - {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("Invalid link pattern for {field}: {pattern} - {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    #[error("No listings found on page {page} of {source_name}")]
    NoListingsFound {
        source_name: String,
        page: u32,
        tried_selectors: Vec<String>,
    },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String, field: String },
}

impl ParsingError {
    pub fn required_field_missing(field: &str, context: Option<&str>) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: context.map(str::to_string),
        }
    }

    pub fn invalid_selector(field: &str, selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(field: &str, pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn no_listings_found(source_name: &str, page: u32, tried_selectors: Vec<String>) -> Self {
        Self::NoListingsFound {
            source_name: source_name.to_string(),
            page,
            tried_selectors,
        }
    }

    /// Check if this error is recoverable
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::RequiredFieldMissing { .. }
            | Self::InvalidSelector { .. }
            | Self::InvalidPattern { .. }
            | Self::UrlResolutionFailed { .. } => true,
            Self::NoListingsFound { .. } | Self::ConfigurationError { .. } => false,
        }
    }

    /// Level this error is logged at: a recoverable error only degrades one
    /// field, anything else loses the whole page
    pub const fn log_level(&self) -> Level {
        if self.is_recoverable() {
            Level::DEBUG
        } else {
            Level::WARN
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(ParsingError::required_field_missing("title", Some("listing")).is_recoverable());
        assert!(ParsingError::invalid_selector("price", "div[", "unexpected end").is_recoverable());
        assert!(!ParsingError::no_listings_found("Amazon", 1, vec![]).is_recoverable());
    }

    #[test]
    fn test_lost_pages_log_louder_than_lost_fields() {
        let missing_title = ParsingError::required_field_missing("title", None);
        let bad_url = ParsingError::UrlResolutionFailed {
            url: "http://[".into(),
            reason: "invalid IPv6".into(),
            base_url: None,
        };
        assert_eq!(missing_title.log_level(), Level::DEBUG);
        assert_eq!(bad_url.log_level(), Level::DEBUG);
        assert_eq!(ParsingError::no_listings_found("Myntra", 3, vec![]).log_level(), Level::WARN);
    }

    #[test]
    fn test_display_names_the_field() {
        let err = ParsingError::invalid_pattern("id", "(", "unclosed group");
        assert_eq!(err.to_string(), "Invalid link pattern for id: ( - unclosed group");
    }
}
