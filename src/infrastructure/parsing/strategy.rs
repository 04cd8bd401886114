//! Field extraction strategies
//!
//! A field is read by trying its strategies in order; the first one yielding a
//! non-empty value wins.

use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ParsingError;

/// One way of reading a field out of a listing container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldStrategy {
    /// Text content of the first descendant matching `selector`
    Text { selector: String },
    /// Attribute of the first descendant matching `selector`
    Attr { selector: String, attr: String },
    /// Attribute of the listing container itself
    ContainerAttr { attr: String },
    /// First capture group of `pattern` applied to the resolved listing link
    LinkPattern { pattern: String },
}

impl FieldStrategy {
    pub fn text(selector: &str) -> Self {
        Self::Text {
            selector: selector.to_string(),
        }
    }

    pub fn attr(selector: &str, attr: &str) -> Self {
        Self::Attr {
            selector: selector.to_string(),
            attr: attr.to_string(),
        }
    }

    pub fn container_attr(attr: &str) -> Self {
        Self::ContainerAttr {
            attr: attr.to_string(),
        }
    }

    pub fn link_pattern(pattern: &str) -> Self {
        Self::LinkPattern {
            pattern: pattern.to_string(),
        }
    }

    fn compile(&self, field: &str) -> Result<CompiledStrategy, ParsingError> {
        let parse_selector = |selector: &str| {
            Selector::parse(selector)
                .map_err(|e| ParsingError::invalid_selector(field, selector, e))
        };

        Ok(match self {
            Self::Text { selector } => CompiledStrategy::Text(parse_selector(selector)?),
            Self::Attr { selector, attr } => {
                CompiledStrategy::Attr(parse_selector(selector)?, attr.clone())
            }
            Self::ContainerAttr { attr } => CompiledStrategy::ContainerAttr(attr.clone()),
            Self::LinkPattern { pattern } => CompiledStrategy::LinkPattern(
                Regex::new(pattern).map_err(|e| ParsingError::invalid_pattern(field, pattern, e))?,
            ),
        })
    }
}

#[derive(Debug, Clone)]
enum CompiledStrategy {
    Text(Selector),
    Attr(Selector, String),
    ContainerAttr(String),
    LinkPattern(Regex),
}

impl CompiledStrategy {
    fn apply(&self, element: &ElementRef<'_>, link: Option<&str>) -> Option<String> {
        let value = match self {
            Self::Text(selector) => element
                .select(selector)
                .next()
                .map(|e| e.text().collect::<String>()),
            Self::Attr(selector, attr) => element
                .select(selector)
                .next()
                .and_then(|e| e.value().attr(attr))
                .map(str::to_string),
            Self::ContainerAttr(attr) => element.value().attr(attr).map(str::to_string),
            Self::LinkPattern(re) => link
                .and_then(|l| re.captures(l))
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        }?;

        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Compiled, ordered strategy list for one field
#[derive(Debug, Clone, Default)]
pub struct FieldChain {
    strategies: Vec<CompiledStrategy>,
    /// Values ending with any of these are treated as empty
    reject_suffixes: Vec<String>,
}

impl FieldChain {
    /// Compile the strategies that are valid. Invalid entries are skipped
    /// with a warning so one bad selector does not disable the field.
    pub fn compile(field: &str, specs: &[FieldStrategy]) -> (Self, Vec<ParsingError>) {
        let mut strategies = Vec::with_capacity(specs.len());
        let mut errors = Vec::new();

        for spec in specs {
            match spec.compile(field) {
                Ok(compiled) => strategies.push(compiled),
                Err(e) => {
                    warn!("Skipping strategy: {}", e);
                    errors.push(e);
                }
            }
        }

        (
            Self {
                strategies,
                reject_suffixes: Vec::new(),
            },
            errors,
        )
    }

    #[must_use]
    pub fn rejecting_suffixes(mut self, suffixes: &[String]) -> Self {
        self.reject_suffixes = suffixes.to_vec();
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn extract(&self, element: &ElementRef<'_>, link: Option<&str>) -> Option<String> {
        self.strategies
            .iter()
            .filter_map(|s| s.apply(element, link))
            .find(|value| !self.is_rejected(value))
    }

    fn is_rejected(&self, value: &str) -> bool {
        self.reject_suffixes.iter().any(|suffix| value.ends_with(suffix.as_str()))
    }
}
