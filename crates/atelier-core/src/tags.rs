//! Tag selection flattening and provider prompt assembly
//!
//! Both outputs derive from the same [`TagSelection`]: the flat
//! [`TagUsage`] list feeds statistics and feedback aggregation, the
//! assembled prompt string goes to the provider. Prompt order is art
//! style, theme, mood, enhancements, quality phrase and must stay that
//! way so stored prompts remain reproducible.

use serde::{Deserialize, Serialize};

/// Phrase appended to the provider prompt when quality enhancement is on
pub const QUALITY_PHRASE: &str = "masterpiece, best quality, highly detailed";

/// Separator between prompt fragments
const PROMPT_SEPARATOR: &str = ", ";

/// Structured tag selection made alongside a prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagSelection {
    #[serde(default)]
    pub art_style: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub technical: Vec<String>,
    #[serde(default)]
    pub composition: Vec<String>,
    #[serde(default)]
    pub enhancement: Vec<String>,
    #[serde(default)]
    pub quality_enhancement: bool,
}

impl TagSelection {
    /// Whether nothing at all is selected
    pub fn is_empty(&self) -> bool {
        self.art_style.is_none()
            && self.theme.is_none()
            && self.mood.is_none()
            && self.technical.is_empty()
            && self.composition.is_empty()
            && self.enhancement.is_empty()
            && !self.quality_enhancement
    }
}

/// Tag category, in extraction order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TagCategory {
    ArtStyle,
    Theme,
    Mood,
    Technical,
    Composition,
    Enhancement,
}

/// One selected tag, flattened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagUsage {
    pub display_name: String,
    pub category: TagCategory,
    pub raw_value: String,
}

impl TagUsage {
    fn new(category: TagCategory, raw_value: &str) -> Self {
        Self {
            display_name: display_name(raw_value),
            category,
            raw_value: raw_value.to_owned(),
        }
    }

    /// Counter key in `category:value` form
    pub fn key(&self) -> String {
        format!("{}:{}", self.category, self.raw_value)
    }
}

/// Iterate selected (category, raw value) pairs in extraction order
fn selected(selection: &TagSelection) -> impl Iterator<Item = (TagCategory, &str)> {
    let singles = [
        (TagCategory::ArtStyle, selection.art_style.as_deref()),
        (TagCategory::Theme, selection.theme.as_deref()),
        (TagCategory::Mood, selection.mood.as_deref()),
    ]
    .into_iter()
    .filter_map(|(category, value)| value.map(|v| (category, v)));

    let multis = [
        (TagCategory::Technical, &selection.technical),
        (TagCategory::Composition, &selection.composition),
        (TagCategory::Enhancement, &selection.enhancement),
    ]
    .into_iter()
    .flat_map(|(category, values)| values.iter().map(move |v| (category, v.as_str())));

    singles
        .chain(multis)
        .filter(|(_, value)| !value.trim().is_empty())
}

/// Flatten a selection into an ordered tag list
pub fn extract(selection: &TagSelection) -> Vec<TagUsage> {
    selected(selection)
        .map(|(category, value)| TagUsage::new(category, value))
        .collect()
}

/// Flatten an optional selection into `category:value` keys
pub fn tag_keys(selection: Option<&TagSelection>) -> Vec<String> {
    selection
        .map(|s| extract(s).iter().map(TagUsage::key).collect())
        .unwrap_or_default()
}

/// Assemble the literal prompt sent to a provider
pub fn build_prompt(base: &str, selection: Option<&TagSelection>) -> String {
    let mut prompt = base.trim().to_owned();

    let Some(selection) = selection else {
        return prompt;
    };

    let fragments = selected(selection)
        .map(|(_, value)| value.trim())
        .chain(selection.quality_enhancement.then_some(QUALITY_PHRASE));

    for fragment in fragments {
        if !prompt.is_empty() {
            prompt.push_str(PROMPT_SEPARATOR);
        }
        prompt.push_str(fragment);
    }

    prompt
}

/// Human-readable name for a raw tag value (`oil_painting` -> `Oil Painting`)
fn display_name(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
