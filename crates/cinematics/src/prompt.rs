use utils::{ScriptMetadata, Tone};

use crate::error::{GenerationError, GenerationResult};

const PANEL_SUFFIX: &str = "comic book panel, bold outlines, vibrant colors, high quality, detailed, \
professional comic art, Instagram story format, vertical composition";

fn style_tokens(tone: &Tone) -> &'static str {
    match tone {
        Tone::Fantasy => {
            "comic book art style, fantasy comic, bold lines, vibrant colors, magical atmosphere"
        }
        Tone::Comedy => {
            "bright comic book style, cartoon-style, humorous, bold outlines, vibrant colors"
        }
        Tone::Epic => "epic comic book style, heroic comic art, bold lines, dramatic composition",
        Tone::Other(_) => "comic book art style, bold lines, vibrant colors, dynamic composition",
    }
}

/// Image prompt for one slot: caption, setting, character first names and
/// tone style tokens.
pub fn build_frame_prompt(caption: &str, metadata: &ScriptMetadata) -> GenerationResult<String> {
    let caption = caption.trim();
    if caption.is_empty() {
        return Err(GenerationError::Validation("caption must not be empty".into()));
    }

    let mut prompt = format!("Comic book panel: {caption}");

    if let Some(setting) = metadata.setting.as_deref() {
        prompt.push_str(&format!(", set in {setting}"));
    }

    let names = metadata.character_first_names();
    if !names.is_empty() {
        prompt.push_str(&format!(", featuring {}", names.join(" and ")));
    }

    prompt.push_str(", ");
    prompt.push_str(style_tokens(&metadata.tone()));
    prompt.push_str(", ");
    prompt.push_str(PANEL_SUFFIX);

    Ok(prompt)
}
