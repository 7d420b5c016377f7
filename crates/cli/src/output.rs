//! Terminal rendering of render outcomes and encoder plans

use cinematics::FrameOrigin;
use colored::Colorize;
use pipeline::{RenderOutcome, RenderPath};

pub struct OutputHandler;

impl OutputHandler {
    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", format!("▶ {}", text).bright_yellow().bold());
        println!("{}", "─".repeat(60).dimmed());
    }

    pub fn print_success(&self, text: &str) {
        println!("{} {}", "✓".bright_green(), text.bright_white());
    }

    pub fn print_warning(&self, text: &str) {
        println!("{} {}", "⚠".bright_yellow(), text.yellow());
    }

    pub fn print_info(&self, text: &str) {
        println!("{} {}", "ℹ".bright_blue(), text);
    }

    pub fn print_field(&self, label: &str, value: impl std::fmt::Display) {
        println!("  {:<12} {}", format!("{label}:").dimmed(), value);
    }

    pub fn print_outcome(&self, outcome: &RenderOutcome) {
        self.print_header(&format!("Episode {}", outcome.episode_id));

        match (&outcome.path, &outcome.fallback_reason) {
            (RenderPath::Cinematic, _) => self.print_success("Cinematic render complete"),
            (RenderPath::Slideshow, Some(reason)) => {
                self.print_warning(&format!("Slideshow fallback: {reason}"))
            }
            (RenderPath::Slideshow, None) => self.print_warning("Slideshow fallback"),
        }

        let artifact = &outcome.artifact;
        self.print_field("Video", &outcome.video_address);
        self.print_field("Duration", format!("{:.1}s", artifact.duration_sec));
        self.print_field("Size", format!("{}x{}", artifact.width, artifact.height));

        let audio = if outcome.audio_tracks.is_empty() {
            "none".to_string()
        } else {
            outcome
                .audio_tracks
                .iter()
                .map(|kind| format!("{kind:?}").to_lowercase())
                .collect::<Vec<_>>()
                .join(" + ")
        };
        self.print_field("Audio", audio);

        if let Some(address) = &outcome.subtitle_address {
            self.print_field("Subtitles", address);
        }

        if !outcome.frames.is_empty() {
            println!();
            for frame in &outcome.frames {
                let origin = match frame.origin {
                    FrameOrigin::Generated => "generated".bright_green(),
                    FrameOrigin::Fallback => "fallback".yellow(),
                };
                println!(
                    "  {} {:<10} {}",
                    format!("#{}", frame.slot_index + 1).bright_cyan(),
                    origin,
                    frame.caption.dimmed()
                );
            }
        }
    }

    /// Shell-quoted ffmpeg invocation, one option per line.
    pub fn print_command(&self, program: &str, args: &[String]) {
        print!("{program}");
        for arg in args {
            if arg.starts_with('-') && !arg.starts_with("-1") {
                print!(" \\\n  {}", shell_quote(arg));
            } else {
                print!(" {}", shell_quote(arg));
            }
        }
        println!();
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:+=,@".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
