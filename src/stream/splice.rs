//! Reasoning-into-content splicing.
//!
//! The backend streams reasoning text on a side channel (`reasoning_content`).
//! Clients only read `content`, so the splicer folds reasoning into it, wrapped
//! in an open/close tag pair, while tracking whether a block is currently open.

use std::sync::Arc;

use crate::config::FeaturesConfig;

/// Tag pair wrapped around spliced reasoning text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningDelimiters {
    pub open: Arc<str>,
    pub close: Arc<str>,
}

impl Default for ReasoningDelimiters {
    fn default() -> Self {
        Self {
            open: Arc::from("<think>\n"),
            close: Arc::from("</think>\n\n"),
        }
    }
}

/// Immutable response-side toggles, fixed when the translator is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationOptions {
    pub show_reasoning: bool,
    pub delimiters: ReasoningDelimiters,
}

impl TranslationOptions {
    #[must_use]
    pub fn from_features(features: &FeaturesConfig) -> Self {
        Self {
            show_reasoning: features.show_reasoning,
            delimiters: ReasoningDelimiters {
                open: Arc::from(features.reasoning_open_tag.as_str()),
                close: Arc::from(features.reasoning_close_tag.as_str()),
            },
        }
    }

    #[must_use]
    pub fn with_reasoning(mut self, show_reasoning: bool) -> Self {
        self.show_reasoning = show_reasoning;
        self
    }
}

/// Whether an opening tag has been emitted without its closing tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpliceState {
    #[default]
    Idle,
    InReasoning,
}

/// Per-stream splicing state machine. One instance per streamed response.
#[derive(Debug)]
pub struct ReasoningSplicer {
    options: TranslationOptions,
    state: SpliceState,
}

impl ReasoningSplicer {
    #[must_use]
    pub fn new(options: TranslationOptions) -> Self {
        Self {
            options,
            state: SpliceState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SpliceState {
        self.state
    }

    /// Combine one event's fragments into the outgoing `content` text.
    ///
    /// Empty strings count as absent. With splicing off, reasoning is dropped
    /// and the result is the plain content (possibly empty).
    pub fn splice(&mut self, reasoning: Option<&str>, content: Option<&str>) -> String {
        let reasoning = reasoning.filter(|r| !r.is_empty());
        let content = content.filter(|c| !c.is_empty());

        if !self.options.show_reasoning {
            return content.unwrap_or_default().to_string();
        }

        let delimiters = &self.options.delimiters;
        let mut out = String::with_capacity(
            reasoning.map_or(0, str::len)
                + content.map_or(0, str::len)
                + delimiters.open.len()
                + delimiters.close.len(),
        );

        if let Some(reasoning) = reasoning {
            if self.state == SpliceState::Idle {
                out.push_str(&delimiters.open);
                self.state = SpliceState::InReasoning;
            }
            out.push_str(reasoning);
        }

        if let Some(content) = content {
            if self.state == SpliceState::InReasoning {
                out.push_str(&delimiters.close);
                self.state = SpliceState::Idle;
            }
            out.push_str(content);
        }

        out
    }
}

/// Whole-message splice for the non-streaming path: reasoning always first.
#[must_use]
pub fn splice_complete(options: &TranslationOptions, reasoning: Option<&str>, content: &str) -> String {
    match reasoning.filter(|r| options.show_reasoning && !r.is_empty()) {
        Some(reasoning) => {
            let delimiters = &options.delimiters;
            let mut out = String::with_capacity(
                delimiters.open.len() + reasoning.len() + delimiters.close.len() + content.len(),
            );
            out.push_str(&delimiters.open);
            out.push_str(reasoning);
            out.push_str(&delimiters.close);
            out.push_str(content);
            out
        }
        None => content.to_string(),
    }
}
