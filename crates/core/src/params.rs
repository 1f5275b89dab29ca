//! Submission parameters.
//!
//! Parameters form a closed sum type keyed by the `type` discriminant. New pipeline
//! kinds add variants here rather than open-ended implementations of a trait.

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult, Violation};

pub const MIN_DIMENSION: u32 = 128;
pub const MAX_DIMENSION: u32 = 2048;
pub const DEFAULT_DIMENSION: u32 = 1024;
pub const MAX_QUERY_CHARS: usize = 1000;
pub const MAX_NEGATIVE_PROMPT_CHARS: usize = 1000;

/// Pipeline-specific parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineParams {
    /// Text-to-image generation.
    #[serde(rename = "GENERATE")]
    TextToImage(TextToImageParams),
}

impl PipelineParams {
    /// Run every structural check, accumulating all violations.
    pub fn validate(&self) -> ValidationResult<()> {
        let violations = match self {
            PipelineParams::TextToImage(p) => p.violations(),
        };

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(violations))
        }
    }

    /// Wire form of the parameters.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl From<TextToImageParams> for PipelineParams {
    fn from(value: TextToImageParams) -> Self {
        PipelineParams::TextToImage(value)
    }
}

/// The prompt sub-object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateParams {
    pub query: String,
}

impl GenerateParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToImageParams {
    pub width: u32,
    pub height: u32,
    /// Must be exactly 1.
    pub num_images: u32,
    pub generate_params: Option<GenerateParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt_decoder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Default for TextToImageParams {
    fn default() -> Self {
        Self {
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            num_images: 1,
            generate_params: None,
            negative_prompt_decoder: None,
            style: None,
        }
    }
}

impl TextToImageParams {
    /// Parameters with default dimensions and the given prompt.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            generate_params: Some(GenerateParams::new(query)),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_negative_prompt(mut self, negative: impl Into<String>) -> Self {
        self.negative_prompt_decoder = Some(negative.into());
        self
    }

    fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();

        check_dimension(&mut out, "width", self.width);
        check_dimension(&mut out, "height", self.height);

        if self.num_images != 1 {
            out.push(Violation::new(
                "num_images",
                "The numImages field must be exactly 1.",
            ));
        }

        match &self.generate_params {
            None => out.push(Violation::new(
                "generate_params",
                "The generateParams object is required.",
            )),
            Some(g) => {
                if g.query.trim().is_empty() {
                    out.push(Violation::new(
                        "generate_params.query",
                        "The query field is required.",
                    ));
                }
                let len = g.query.chars().count();
                if len == 0 || len > MAX_QUERY_CHARS {
                    out.push(Violation::new(
                        "generate_params.query",
                        format!(
                            "The query field must be between 1 and {MAX_QUERY_CHARS} characters long."
                        ),
                    ));
                }
            }
        }

        if let Some(negative) = &self.negative_prompt_decoder {
            if negative.chars().count() > MAX_NEGATIVE_PROMPT_CHARS {
                out.push(Violation::new(
                    "negative_prompt_decoder",
                    format!(
                        "The negativePromptDecoder field must be at most {MAX_NEGATIVE_PROMPT_CHARS} characters long."
                    ),
                ));
            }
        }

        out
    }
}

fn check_dimension(out: &mut Vec<Violation>, field: &str, value: u32) {
    if value < MIN_DIMENSION {
        out.push(Violation::new(
            field,
            format!("The {field} field must be at least {MIN_DIMENSION}."),
        ));
    } else if value > MAX_DIMENSION {
        out.push(Violation::new(
            field,
            format!("The {field} field must be at most {MAX_DIMENSION}."),
        ));
    }
}
