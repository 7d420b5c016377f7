//! Episode metadata shared by every render stage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Narrative tone of a series. Unknown tones are kept verbatim so that
/// downstream stages can fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Tone {
    Fantasy,
    Comedy,
    Epic,
    Other(String),
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Fantasy
    }
}

impl Tone {
    pub fn as_str(&self) -> &str {
        match self {
            Tone::Fantasy => "fantasy",
            Tone::Comedy => "comedy",
            Tone::Epic => "epic",
            Tone::Other(value) => value.as_str(),
        }
    }
}

impl From<&str> for Tone {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "fantasy" => Tone::Fantasy,
            "comedy" => Tone::Comedy,
            "epic" => Tone::Epic,
            _ => Tone::Other(value.trim().to_string()),
        }
    }
}

impl From<String> for Tone {
    fn from(value: String) -> Self {
        Tone::from(value.as_str())
    }
}

impl From<Tone> for String {
    fn from(tone: Tone) -> Self {
        tone.as_str().to_string()
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Script metadata handed to the render pipeline. Every field is optional on
/// the wire; [`ScriptMetadata::normalized`] is applied once at pipeline entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptMetadata {
    #[serde(default)]
    pub episode_title: Option<String>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    #[serde(default)]
    pub setting: Option<String>,
    /// Comma separated on the wire ("Mara Vell, Tobin Ash").
    #[serde(default, deserialize_with = "deserialize_characters")]
    pub characters: Vec<String>,
    #[serde(default)]
    pub tone: Option<Tone>,
    #[serde(default)]
    pub captions: Vec<String>,
}

impl ScriptMetadata {
    pub fn tone(&self) -> Tone {
        self.tone.clone().unwrap_or_default()
    }

    pub fn episode_number(&self) -> u32 {
        self.episode_number.unwrap_or(1).max(1)
    }

    /// First word of every character entry.
    pub fn character_first_names(&self) -> Vec<String> {
        self.characters
            .iter()
            .filter_map(|c| c.split_whitespace().next())
            .map(|name| name.to_string())
            .collect()
    }

    /// Trim text fields and drop blank entries.
    pub fn normalized(mut self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.episode_title = clean(self.episode_title);
        self.setting = clean(self.setting);
        self.characters = self
            .characters
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.captions = self
            .captions
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        self
    }

    pub fn parse_characters(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

fn deserialize_characters<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Characters {
        Joined(String),
        List(Vec<String>),
    }

    Ok(match Option::<Characters>::deserialize(deserializer)? {
        Some(Characters::Joined(raw)) => ScriptMetadata::parse_characters(&raw),
        Some(Characters::List(list)) => list,
        None => Vec::new(),
    })
}
