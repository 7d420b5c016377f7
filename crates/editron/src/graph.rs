//! Typed filter graph, serialised to ffmpeg `-filter_complex` syntax.

use std::{collections::HashSet, fmt, path::Path};

use crate::{EditronError, EditronResult};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Scale to fit, letterbox to the target size, normalise fps and format.
    ScalePad {
        width: u32,
        height: u32,
        fps: u32,
        pixel_format: String,
    },
    Crossfade { duration: f64, offset: f64 },
    Concat { segments: usize },
    BandPass { low_hz: u32, high_hz: u32 },
    Mix { weights: Vec<f64> },
    Resample { sample_rate: u32 },
    SubtitleBurn { path: String },
}

/// Escape a file path for use as a filter option value inside
/// `-filter_complex`. Two levels apply: the option value (`\ ' :`) and then
/// the filtergraph description (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &Path) -> String {
    let value = escape_chars(&path.to_string_lossy(), &['\\', '\'', ':']);
    escape_chars(&value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn secs(value: f64) -> String {
    let s = format!("{value:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".into()
    } else {
        s.to_string()
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::ScalePad {
                width,
                height,
                fps,
                pixel_format,
            } => write!(
                f,
                "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format={pixel_format}"
            ),
            FilterOp::Crossfade { duration, offset } => write!(
                f,
                "xfade=transition=fade:duration={}:offset={}",
                secs(*duration),
                secs(*offset)
            ),
            FilterOp::Concat { segments } => write!(f, "concat=n={segments}:v=1:a=0"),
            FilterOp::BandPass { low_hz, high_hz } => {
                write!(f, "highpass=f={low_hz},lowpass=f={high_hz}")
            }
            FilterOp::Mix { weights } => {
                let weights: Vec<String> = weights.iter().map(|w| secs(*w)).collect();
                write!(
                    f,
                    "amix=inputs={}:duration=first:weights={}",
                    weights.len(),
                    weights.join(" ")
                )
            }
            FilterOp::Resample { sample_rate } => write!(f, "aresample={sample_rate}"),
            FilterOp::SubtitleBurn { path } => write!(f, "subtitles={path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterNode {
    pub inputs: Vec<String>,
    pub op: FilterOp,
    pub output: String,
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        write!(f, "{}[{}]", self.op, self.output)
    }
}

/// Stream specifiers such as `0:v` or `3:a` refer to encoder inputs.
fn is_stream_specifier(label: &str) -> bool {
    label
        .split_once(':')
        .map(|(index, kind)| index.parse::<usize>().is_ok() && matches!(kind, "v" | "a"))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its output label.
    pub fn push(&mut self, inputs: Vec<String>, op: FilterOp, output: impl Into<String>) -> String {
        let output = output.into();
        self.nodes.push(FilterNode {
            inputs,
            op,
            output: output.clone(),
        });
        output
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every label is produced once, before use, and consumed at most once.
    pub fn validate(&self) -> EditronResult<()> {
        let mut produced = HashSet::new();
        let mut consumed = HashSet::new();

        for node in &self.nodes {
            for input in &node.inputs {
                if !is_stream_specifier(input) && !produced.contains(input.as_str()) {
                    return Err(EditronError::InvalidPlan(format!(
                        "label [{input}] used before it is produced"
                    )));
                }
                if !consumed.insert(input.as_str()) {
                    return Err(EditronError::InvalidPlan(format!(
                        "label [{input}] consumed twice"
                    )));
                }
            }
            if !produced.insert(node.output.as_str()) {
                return Err(EditronError::InvalidPlan(format!(
                    "label [{}] produced twice",
                    node.output
                )));
            }
        }
        Ok(())
    }

    pub fn to_filter_complex(&self) -> String {
        self.nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}
