//! Episode script as produced by the writer model, plus the post-processing
//! applied before it reaches the renderer.

use serde::{Deserialize, Serialize};
use utils::ScriptMetadata;

pub const MAX_CAPTION_CHARS: usize = 140;
pub const CAPTION_COUNT: usize = 6;
pub const MIN_BEATS: usize = 6;
pub const MAX_BEATS: usize = 10;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dialog {
    pub character: String,
    pub line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub a: String,
    pub b: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeScript {
    pub episode_title: String,
    pub synopsis: String,
    pub beats: Vec<String>,
    #[serde(default)]
    pub dialogs: Vec<Dialog>,
    pub captions: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub cliffhanger: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("expected 6-10 beats, got {0}")]
    BeatCount(usize),

    #[error("expected 6 captions, got {0}")]
    CaptionCount(usize),

    #[error("dialog line for {character} exceeds 140 characters")]
    DialogTooLong { character: String },
}

impl EpisodeScript {
    /// Shape checks the writer model is asked to honour.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if !(MIN_BEATS..=MAX_BEATS).contains(&self.beats.len()) {
            return Err(ScriptError::BeatCount(self.beats.len()));
        }
        if self.captions.len() != CAPTION_COUNT {
            return Err(ScriptError::CaptionCount(self.captions.len()));
        }
        if let Some(dialog) = self
            .dialogs
            .iter()
            .find(|d| d.line.chars().count() > MAX_CAPTION_CHARS)
        {
            return Err(ScriptError::DialogTooLong {
                character: dialog.character.clone(),
            });
        }
        Ok(())
    }

    /// Render metadata for this script. Series-level fields come from the
    /// caller; captions and title come from the script.
    pub fn metadata(&self, series: &ScriptMetadata) -> ScriptMetadata {
        ScriptMetadata {
            episode_title: Some(self.episode_title.clone()),
            captions: self.captions.clone(),
            ..series.clone()
        }
    }
}

/// Shorten one caption to at most [`MAX_CAPTION_CHARS`] characters.
pub fn truncate_caption(caption: &str) -> String {
    if caption.chars().count() <= MAX_CAPTION_CHARS {
        return caption.to_string();
    }
    let kept: String = caption
        .chars()
        .take(MAX_CAPTION_CHARS - ELLIPSIS.len())
        .collect();
    format!("{kept}{ELLIPSIS}")
}

pub fn ensure_captions_length(mut script: EpisodeScript) -> EpisodeScript {
    script.captions = script
        .captions
        .iter()
        .map(|c| truncate_caption(c))
        .collect();
    script
}

/// Prefix the synopsis with the previous episode's, so a series reads as
/// one continuing story.
pub fn merge_with_prior_synopsis(mut script: EpisodeScript, prior: Option<&str>) -> EpisodeScript {
    let Some(prior) = prior.filter(|p| !p.is_empty()) else {
        return script;
    };

    let separator = if prior.ends_with('.') { "" } else { "." };
    script.synopsis = format!("{prior}{separator} {}", script.synopsis);
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> EpisodeScript {
        EpisodeScript {
            episode_title: "The Ember Gate".into(),
            synopsis: "Mara opens the gate.".into(),
            beats: (1..=6).map(|i| format!("Beat {i}")).collect(),
            dialogs: vec![Dialog {
                character: "Mara".into(),
                line: "It's open.".into(),
                mood: None,
            }],
            captions: (1..=6).map(|i| format!("Caption {i}")).collect(),
            relationships: vec![Relationship {
                a: "Mara".into(),
                b: "Tobin".into(),
                kind: "rivals".into(),
            }],
            cliffhanger: "Something steps through.".into(),
        }
    }

    #[test]
    fn test_long_caption_truncated_to_limit() {
        for len in [141, 200, 1000] {
            let out = truncate_caption(&"x".repeat(len));
            assert_eq!(out.chars().count(), MAX_CAPTION_CHARS);
            assert!(out.ends_with("..."));
        }
    }

    #[test]
    fn test_short_caption_untouched() {
        let exact = "y".repeat(140);
        assert_eq!(truncate_caption(&exact), exact);
        assert_eq!(truncate_caption("short"), "short");
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let out = truncate_caption(&"é".repeat(150));
        assert_eq!(out.chars().count(), MAX_CAPTION_CHARS);
        assert!(out.starts_with("ééé"));
    }

    #[test]
    fn test_ensure_captions_length_applies_to_all() {
        let mut s = script();
        s.captions[2] = "z".repeat(300);
        let s = ensure_captions_length(s);
        assert_eq!(s.captions[2].chars().count(), 140);
        assert_eq!(s.captions[0], "Caption 1");
    }

    #[test]
    fn test_merge_begins_with_prior() {
        let merged = merge_with_prior_synopsis(script(), Some("Tobin lost the map"));
        assert!(merged.synopsis.starts_with("Tobin lost the map"));
        assert_eq!(merged.synopsis, "Tobin lost the map. Mara opens the gate.");

        let merged = merge_with_prior_synopsis(script(), Some("Tobin lost the map."));
        assert_eq!(merged.synopsis, "Tobin lost the map. Mara opens the gate.");
    }

    #[test]
    fn test_merge_without_prior_is_identity() {
        assert_eq!(merge_with_prior_synopsis(script(), None), script());
        assert_eq!(merge_with_prior_synopsis(script(), Some("")), script());
    }

    #[test]
    fn test_validate_shape() {
        assert!(script().validate().is_ok());

        let mut s = script();
        s.captions.pop();
        assert_eq!(s.validate(), Err(ScriptError::CaptionCount(5)));

        let mut s = script();
        s.beats.truncate(3);
        assert_eq!(s.validate(), Err(ScriptError::BeatCount(3)));
    }

    #[test]
    fn test_parses_camel_case_json() {
        let json = r#"{
            "episodeTitle": "Pilot",
            "synopsis": "It begins.",
            "beats": ["a","b","c","d","e","f"],
            "dialogs": [{"character": "Mara", "line": "Hi", "mood": "wry"}],
            "captions": ["1","2","3","4","5","6"],
            "relationships": [{"a": "Mara", "b": "Tobin", "type": "siblings"}],
            "cliffhanger": "Then silence."
        }"#;
        let parsed: EpisodeScript = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.relationships[0].kind, "siblings");
        assert_eq!(parsed.dialogs[0].mood.as_deref(), Some("wry"));
        assert!(parsed.validate().is_ok());
    }
}
