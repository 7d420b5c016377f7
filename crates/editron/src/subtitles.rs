//! Timed caption windows rendered as ASS (burn-in) and SRT (soft subtitles)

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::EditronResult;

/// Style applied uniformly to every window. Colours are `RRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    pub fill_color: String,
    pub outline_color: String,
    /// ASS alpha, 0x00 opaque to 0xFF transparent.
    pub outline_alpha: u8,
    pub outline_width: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial".into(),
            font_size: 24,
            fill_color: "FFFFFF".into(),
            outline_color: "000000".into(),
            outline_alpha: 0x80,
            outline_width: 2,
        }
    }
}

/// `RRGGBB` to the ASS `BBGGRR` order.
fn ass_color(rgb: &str) -> String {
    let rgb = rgb.trim_start_matches('#');
    if rgb.len() != 6 || !rgb.chars().all(|c| c.is_ascii_hexdigit()) {
        return "FFFFFF".into();
    }
    let upper = rgb.to_ascii_uppercase();
    format!("{}{}{}", &upper[4..6], &upper[2..4], &upper[0..2])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    /// 1-based, as in SRT.
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub style: SubtitleStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub subtitles: Vec<Subtitle>,
}

/// Paths of the written timed-text documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleFiles {
    pub ass_path: PathBuf,
    pub srt_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SubtitleBuilder {
    caption_duration: Duration,
    style: SubtitleStyle,
}

impl SubtitleBuilder {
    /// `caption_duration` must match the per-frame display duration.
    pub fn new(caption_duration: Duration) -> Self {
        Self {
            caption_duration,
            style: SubtitleStyle::default(),
        }
    }

    /// Window `i` covers `[i*d, (i+1)*d)`.
    pub fn build(&self, captions: &[String]) -> SubtitleTrack {
        let d = self.caption_duration.as_millis() as u64;
        let subtitles = captions
            .iter()
            .enumerate()
            .map(|(i, text)| Subtitle {
                index: i + 1,
                start_ms: i as u64 * d,
                end_ms: (i as u64 + 1) * d,
                text: text.trim().to_string(),
                style: self.style.clone(),
            })
            .collect();
        SubtitleTrack { subtitles }
    }
}

fn srt_time(ms: u64) -> String {
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

fn ass_time(ms: u64) -> String {
    format!(
        "{}:{:02}:{:02}.{:02}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        (ms % 1000) / 10
    )
}

fn ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace("\r\n", "\\N")
        .replace('\n', "\\N")
}

impl SubtitleTrack {
    pub fn len(&self) -> usize {
        self.subtitles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subtitles.is_empty()
    }

    /// End of the last window.
    pub fn total_ms(&self) -> u64 {
        self.subtitles.last().map(|s| s.end_ms).unwrap_or(0)
    }

    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for sub in &self.subtitles {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                sub.index,
                srt_time(sub.start_ms),
                srt_time(sub.end_ms),
                sub.text
            ));
        }
        out
    }

    pub fn to_ass(&self, title: &str, play_res: (u32, u32)) -> String {
        let style = self
            .subtitles
            .first()
            .map(|s| s.style.clone())
            .unwrap_or_default();

        let mut out = format!(
            "[Script Info]\n\
             Title: {title}\n\
             ScriptType: v4.00+\n\
             PlayResX: {}\n\
             PlayResY: {}\n\
             \n\
             [V4+ Styles]\n\
             Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
             Style: Default,{},{},&H00{},&H000000FF,&H00{},&H80000000,0,0,0,0,100,100,0,0,1,{},2,2,10,10,10,1\n\
             \n\
             [Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n",
            play_res.0,
            play_res.1,
            style.font_name,
            style.font_size,
            ass_color(&style.fill_color),
            ass_color(&style.outline_color),
            style.outline_width,
        );

        for sub in &self.subtitles {
            out.push_str(&format!(
                "Dialogue: 0,{},{},Default,,0,0,0,,{{\\1c&H{}&\\3c&H{}&\\3a&H{:02X}&}}{}\n",
                ass_time(sub.start_ms),
                ass_time(sub.end_ms),
                ass_color(&sub.style.fill_color),
                ass_color(&sub.style.outline_color),
                sub.style.outline_alpha,
                ass_text(&sub.text),
            ));
        }
        out
    }

    /// Write `ep-{id}-subtitles.ass` and `.srt` into `dir`.
    pub async fn write(
        &self,
        dir: &Path,
        episode_id: &str,
        play_res: (u32, u32),
    ) -> EditronResult<SubtitleFiles> {
        tokio::fs::create_dir_all(dir).await?;
        let ass_path = dir.join(format!("ep-{episode_id}-subtitles.ass"));
        let srt_path = dir.join(format!("ep-{episode_id}-subtitles.srt"));

        let title = format!("Drama Series Episode {episode_id}");
        tokio::fs::write(&ass_path, self.to_ass(&title, play_res)).await?;
        tokio::fs::write(&srt_path, self.to_srt()).await?;

        Ok(SubtitleFiles { ass_path, srt_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captions(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("Caption {i}")).collect()
    }

    #[test]
    fn test_windows_are_contiguous_and_cover_range() {
        let builder = SubtitleBuilder::new(Duration::from_secs(3));
        for m in 1..=8 {
            let track = builder.build(&captions(m));
            assert_eq!(track.len(), m);
            assert_eq!(track.subtitles[0].start_ms, 0);
            for pair in track.subtitles.windows(2) {
                assert_eq!(pair[0].end_ms, pair[1].start_ms);
                assert!(pair[0].start_ms < pair[0].end_ms);
            }
            assert_eq!(track.total_ms(), m as u64 * 3000);
        }
    }

    #[test]
    fn test_srt_rendering() {
        let track = SubtitleBuilder::new(Duration::from_millis(2500)).build(&captions(2));
        let srt = track.to_srt();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,500\nCaption 0\n\n"));
        assert!(srt.contains("2\n00:00:02,500 --> 00:00:05,000\nCaption 1"));
    }

    #[test]
    fn test_ass_rendering_carries_style() {
        let track = SubtitleBuilder::new(Duration::from_secs(3)).build(&captions(2));
        let ass = track.to_ass("Drama Series Episode e1", (1080, 1920));

        assert!(ass.contains("Title: Drama Series Episode e1"));
        assert!(ass.contains("Style: Default,Arial,24,&H00FFFFFF"));
        assert!(ass.contains(
            "Dialogue: 0,0:00:03.00,0:00:06.00,Default,,0,0,0,,{\\1c&HFFFFFF&\\3c&H000000&\\3a&H80&}Caption 1"
        ));
    }

    #[test]
    fn test_ass_color_is_bgr() {
        assert_eq!(ass_color("FF8000"), "0080FF");
        assert_eq!(ass_color("#00ff00"), "00FF00");
        assert_eq!(ass_color("nonsense"), "FFFFFF");
    }

    #[tokio::test]
    async fn test_write_produces_both_documents() {
        let dir = tempfile::tempdir().unwrap();
        let track = SubtitleBuilder::new(Duration::from_secs(3)).build(&captions(6));

        let files = track.write(dir.path(), "e9", (1080, 1920)).await.unwrap();

        assert!(files.ass_path.ends_with("ep-e9-subtitles.ass"));
        let srt = std::fs::read_to_string(&files.srt_path).unwrap();
        assert!(srt.contains("6\n00:00:15,000 --> 00:00:18,000"));
    }
}
