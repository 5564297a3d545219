//! Prompt Templates
//!
//! Maps each selection action to its system preamble, prompt text and
//! sampling parameters. Everything here is pure: identical input and
//! sampling always yield identical output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Preamble used by the free-form prompt box
pub const FREE_PROMPT_PREAMBLE: &str = "You are a helpful assistant.";

/// Output language pinned for free-form prompts
pub const FREE_PROMPT_LANGUAGE: &str = "en";

const CITATION_PREAMBLE: &str = "You are an assistant that extracts citation metadata.";

/// Operations a user can trigger over selected page text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Summarize,
    Translate,
    Proofread,
    Quotes,
    SaveHighlight,
    ExtractCitation,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Summarize,
        Action::Translate,
        Action::Proofread,
        Action::Quotes,
        Action::SaveHighlight,
        Action::ExtractCitation,
    ];

    /// Wire identifier, e.g. `save-highlight`
    pub fn id(&self) -> &'static str {
        match self {
            Action::Summarize => "summarize",
            Action::Translate => "translate",
            Action::Proofread => "proofread",
            Action::Quotes => "quotes",
            Action::SaveHighlight => "save-highlight",
            Action::ExtractCitation => "extract-citation",
        }
    }

    /// Menu label shown to the user
    pub fn title(&self) -> &'static str {
        match self {
            Action::Summarize => "Summarize Selection",
            Action::Translate => "Translate Selection",
            Action::Proofread => "Proofread Selection",
            Action::Quotes => "Find Related Quotes",
            Action::SaveHighlight => "Save Highlighted Text",
            Action::ExtractCitation => "Extract Citation Info",
        }
    }

    /// Parse a wire identifier. Unknown identifiers yield `None`.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// User-controlled sampling values (the temperature and top-K sliders)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    pub temperature: f32,
    pub top_k: u32,
}

/// Sampling bounds advertised by the model backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub default_temperature: f32,
    pub default_top_k: u32,
    pub max_top_k: u32,
}

impl Sampling {
    pub const MAX_TEMPERATURE: f32 = 2.0;

    /// Initial slider values: default temperature, top-K capped at 3
    pub fn from_capabilities(caps: &ModelCapabilities) -> Self {
        Self {
            temperature: caps.default_temperature,
            top_k: caps.default_top_k.min(3).max(1),
        }
    }

    /// Return a copy with values clamped into the backend's bounds
    pub fn clamped(self, caps: &ModelCapabilities) -> Self {
        Self {
            temperature: self.temperature.clamp(0.0, Self::MAX_TEMPERATURE),
            top_k: self.top_k.clamp(1, caps.max_top_k.max(1)),
        }
    }
}

/// Parameters a model session is created with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptParameters {
    pub system_preamble: String,
    pub temperature: f32,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_language: Option<String>,
}

impl PromptParameters {
    fn with_sampling(preamble: &str, sampling: Sampling) -> Self {
        Self {
            system_preamble: preamble.to_string(),
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            output_language: None,
        }
    }
}

/// A fully built request ready for a model session
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub prompt: String,
    pub params: PromptParameters,
}

/// Build the templated request for a forwarded action.
///
/// Returns `None` for actions that never reach the model
/// (`save-highlight`) and for citation extraction, which has its own
/// builder.
pub fn build_request(action: Action, text: &str, sampling: Sampling) -> Option<PromptRequest> {
    let (prompt, preamble) = match action {
        Action::Summarize => (
            format!("Summarize the following text:\n\n{text}"),
            "You are an expert summarizer.",
        ),
        Action::Translate => (
            format!("Translate this text into English:\n\n{text}"),
            "You are a multilingual translator.",
        ),
        Action::Proofread => (
            format!("Proofread and improve clarity:\n\n{text}"),
            "You are a professional editor.",
        ),
        Action::Quotes => (
            format!("Find 3 relevant quotes related to this text:\n\"{text}\""),
            "You are a literary expert providing meaningful quotes.",
        ),
        Action::SaveHighlight | Action::ExtractCitation => return None,
    };

    Some(PromptRequest {
        prompt,
        params: PromptParameters::with_sampling(preamble, sampling),
    })
}

/// Build the free-form prompt box request
pub fn build_free_prompt(text: &str, sampling: Sampling) -> PromptRequest {
    let mut params = PromptParameters::with_sampling(FREE_PROMPT_PREAMBLE, sampling);
    params.output_language = Some(FREE_PROMPT_LANGUAGE.to_string());
    PromptRequest {
        prompt: text.trim().to_string(),
        params,
    }
}

/// Build the citation extraction request. Sampling is pinned to
/// temperature 0 / top-K 1 regardless of the sliders.
pub fn build_citation_request(text: &str) -> PromptRequest {
    let prompt = format!(
        r#"
Extract structured citation info for this text:
"{text}"

Return JSON with:
- title
- author
- date
- url (use this page URL if not available)
JSON only.
"#
    );

    PromptRequest {
        prompt,
        params: PromptParameters {
            system_preamble: CITATION_PREAMBLE.to_string(),
            temperature: 0.0,
            top_k: 1,
            output_language: None,
        },
    }
}
