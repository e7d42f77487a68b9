//! Configuration for span location and highlighting

use std::env;

use crate::document::{Color, HighlightError, Result};

/// Highlight configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightConfig {
    /// Stroke color of value highlights
    pub highlight_color: Color,
    /// Color the viewer uses for located context hits
    pub search_result_color: Color,
    /// Timeout for one page-scoped search
    pub search_timeout_secs: u64,
    /// Timeout for extracting one page's text
    pub text_timeout_secs: u64,
    /// Maximum page-scoped searches per located span (0 = unlimited)
    pub max_searches: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            highlight_color: Color::rgb(0, 250, 255),
            search_result_color: Color::rgb(252, 233, 106),
            search_timeout_secs: 30,
            text_timeout_secs: 15,
            max_searches: 512,
        }
    }
}

impl HighlightConfig {
    /// Load from `SPAN_*` environment variables, defaulting unset ones
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            highlight_color: match env::var("SPAN_HIGHLIGHT_COLOR") {
                Ok(hex) => Color::from_hex(&hex)?,
                Err(_) => defaults.highlight_color,
            },
            search_result_color: match env::var("SPAN_SEARCH_RESULT_COLOR") {
                Ok(hex) => Color::from_hex(&hex)?,
                Err(_) => defaults.search_result_color,
            },
            search_timeout_secs: parse_var("SPAN_SEARCH_TIMEOUT_SECS")?
                .unwrap_or(defaults.search_timeout_secs),
            text_timeout_secs: parse_var("SPAN_TEXT_TIMEOUT_SECS")?
                .unwrap_or(defaults.text_timeout_secs),
            max_searches: parse_var("SPAN_MAX_SEARCHES")?.unwrap_or(defaults.max_searches),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| HighlightError::InvalidConfig(format!("{}={:?}", name, raw))),
        Err(_) => Ok(None),
    }
}
