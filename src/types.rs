use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const MIN_DESCRIPTION_CHARS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields are required")]
    MissingField,

    #[error("Title must be at least 3 characters long")]
    DescriptionTooShort,

    #[error("Unknown personality: {0}")]
    UnknownTone(String),
}

/// Personality the generated names and slogans should carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Funny,
    Neutral,
    Cool,
    Serious,
    Expensive,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Funny,
        Tone::Neutral,
        Tone::Cool,
        Tone::Serious,
        Tone::Expensive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Funny => "funny",
            Tone::Neutral => "neutral",
            Tone::Cool => "cool",
            Tone::Serious => "serious",
            Tone::Expensive => "expensive",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Tone::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownTone(wanted.to_string()))
    }
}

/// JSON body accepted by the relay. Field names are the ones the form posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandgenBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// A validated generation request. Only obtainable through [`GenerationRequest::new`]
/// or `TryFrom<BrandgenBody>`, so holding one means the inputs passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    description: String,
    tone: Tone,
}

impl GenerationRequest {
    pub fn new(description: &str, tone: Tone) -> Result<Self, ValidationError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ValidationError::MissingField);
        }
        if description.chars().count() < MIN_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionTooShort);
        }
        Ok(Self {
            description: description.to_string(),
            tone,
        })
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn prompt(&self) -> String {
        format!(
            "Generate 5 brand names and slogans for a brand that {}, with {} Personality, ",
            self.description, self.tone
        )
    }

    pub fn to_body(&self) -> BrandgenBody {
        BrandgenBody {
            title: Some(self.description.clone()),
            style: Some(self.tone.to_string()),
        }
    }
}

impl TryFrom<BrandgenBody> for GenerationRequest {
    type Error = ValidationError;

    fn try_from(body: BrandgenBody) -> Result<Self, Self::Error> {
        let present = |field: Option<String>| field.filter(|value| !value.trim().is_empty());
        let (Some(title), Some(style)) = (present(body.title), present(body.style)) else {
            return Err(ValidationError::MissingField);
        };
        let tone = style.parse::<Tone>()?;
        GenerationRequest::new(&title, tone)
    }
}
