//! Validation of new analysis submissions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{ContentType, TargetAudience};

pub const MAX_CONTENT_CHARS: usize = 10_000;
pub const MAX_PLATFORM_CHARS: usize = 32;
pub const MAX_TITLE_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("content must not be empty")]
    EmptyContent,
    #[error("content must be at most {MAX_CONTENT_CHARS} characters, got {0}")]
    ContentTooLong(usize),
    #[error("at least one platform must be selected")]
    NoPlatforms,
    #[error("invalid platform identifier '{0}'")]
    InvalidPlatform(String),
    #[error("targetAudience.ageRange must not be empty")]
    MissingAgeRange,
}

/// Body of `POST /api/analysis`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub content: String,
    pub content_type: ContentType,
    pub platforms: Vec<String>,
    pub target_audience: TargetAudience,
}

/// A validated, normalized submission ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnalysis {
    pub title: String,
    pub content: String,
    pub content_type: ContentType,
    pub platforms: Vec<String>,
    pub target_audience: TargetAudience,
}

impl CreateAnalysisRequest {
    /// Validate the submission and normalize its platform list.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self) -> Result<NewAnalysis, ValidationError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        let content_chars = content.chars().count();
        if content_chars > MAX_CONTENT_CHARS {
            return Err(ValidationError::ContentTooLong(content_chars));
        }

        let platforms = normalize_platforms(&self.platforms)?;

        let age_range = self.target_audience.age_range.trim();
        if age_range.is_empty() {
            return Err(ValidationError::MissingAgeRange);
        }

        Ok(NewAnalysis {
            title: title_from_content(content),
            content: content.to_owned(),
            content_type: self.content_type,
            platforms,
            target_audience: TargetAudience {
                age_range: age_range.to_owned(),
                interests: clean_list(&self.target_audience.interests),
                demographics: clean_list(&self.target_audience.demographics),
            },
        })
    }
}

/// Lower-case, trim, and de-duplicate platform identifiers, keeping the order
/// in which they were first selected.
fn normalize_platforms(raw: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for platform in raw {
        let p = platform.trim().to_lowercase();
        let valid = !p.is_empty()
            && p.len() <= MAX_PLATFORM_CHARS
            && p
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ValidationError::InvalidPlatform(platform.clone()));
        }
        if !out.contains(&p) {
            out.push(p);
        }
    }
    if out.is_empty() {
        return Err(ValidationError::NoPlatforms);
    }
    Ok(out)
}

fn clean_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Display title: first line of the content, cut to [`MAX_TITLE_CHARS`].
#[must_use]
pub fn title_from_content(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= MAX_TITLE_CHARS {
        return first_line.to_owned();
    }
    let mut title: String = first_line.chars().take(MAX_TITLE_CHARS - 1).collect();
    title.push('…');
    title
}
