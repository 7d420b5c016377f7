//! Subcommand handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use pipeline::{
    script::{ensure_captions_length, merge_with_prior_synopsis},
    EpisodeScript, PipelineConfig, RenderPipeline, RenderRequest,
};
use utils::{ScriptMetadata, Tone};

use crate::{config, output::OutputHandler};

/// Series-level inputs shared by `render` and `plan`.
#[derive(Debug, Clone, clap::Args)]
pub struct EpisodeArgs {
    /// Episode script JSON (episodeTitle, synopsis, beats, captions, ...)
    #[arg(short, long)]
    pub script: PathBuf,

    /// Episode identifier, used for file names and storage paths
    #[arg(short, long)]
    pub episode_id: String,

    /// Original panel images, in slot order
    #[arg(short, long, num_args = 1.., required = true)]
    pub panels: Vec<PathBuf>,

    /// Narration text; defaults to the script's cliffhanger
    #[arg(long)]
    pub hook: Option<String>,

    /// Series tone (fantasy, comedy, epic, ...)
    #[arg(long, default_value = "fantasy")]
    pub tone: String,

    #[arg(long)]
    pub setting: Option<String>,

    /// Comma separated character names
    #[arg(long)]
    pub characters: Option<String>,

    #[arg(long)]
    pub episode_number: Option<u32>,

    /// Synopsis of the previous episode, prepended to this one
    #[arg(long)]
    pub prior_synopsis: Option<String>,
}

fn read_script(path: &Path, prior_synopsis: Option<&str>) -> Result<EpisodeScript> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    let script: EpisodeScript = serde_json::from_str(&raw)
        .with_context(|| format!("parsing script {}", path.display()))?;

    let script = merge_with_prior_synopsis(ensure_captions_length(script), prior_synopsis);
    if let Err(err) = script.validate() {
        tracing::warn!(script = %path.display(), error = %err, "script shape is off, rendering anyway");
    }
    Ok(script)
}

fn build_request(args: &EpisodeArgs) -> Result<(EpisodeScript, RenderRequest)> {
    let script = read_script(&args.script, args.prior_synopsis.as_deref())?;

    let series = ScriptMetadata {
        episode_number: args.episode_number,
        setting: args.setting.clone(),
        characters: args
            .characters
            .as_deref()
            .map(ScriptMetadata::parse_characters)
            .unwrap_or_default(),
        tone: Some(Tone::from(args.tone.as_str())),
        ..ScriptMetadata::default()
    };

    let hook = args
        .hook
        .clone()
        .unwrap_or_else(|| script.cliffhanger.clone());

    let request = RenderRequest {
        episode_id: args.episode_id.clone(),
        panel_sources: args.panels.clone(),
        hook,
        metadata: script.metadata(&series),
    };
    Ok((script, request))
}

pub async fn render(config: &PipelineConfig, args: &EpisodeArgs, json: bool) -> Result<()> {
    let (script, request) = build_request(args)?;
    for panel in &request.panel_sources {
        if !panel.is_file() {
            bail!("panel source not found: {}", panel.display());
        }
    }

    let pipeline = RenderPipeline::from_config(config).context("building render pipeline")?;
    tracing::info!(
        episode_id = %request.episode_id,
        title = %script.episode_title,
        panels = request.panel_sources.len(),
        "rendering episode"
    );

    let outcome = pipeline
        .render(request)
        .await
        .with_context(|| format!("rendering episode {}", args.episode_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        OutputHandler.print_outcome(&outcome);
    }
    Ok(())
}

pub fn plan(config: &PipelineConfig, args: &EpisodeArgs) -> Result<()> {
    let (_, request) = build_request(args)?;
    let pipeline = RenderPipeline::from_config(config).context("building render pipeline")?;
    let job = pipeline.preview_job(&request)?;

    let output = OutputHandler;
    output.print_info(&format!(
        "{} frames, {} inputs, {} filter nodes",
        pipeline.slot_count(),
        job.inputs.len(),
        job.graph.nodes().len()
    ));
    output.print_command("ffmpeg", &job.to_args());
    Ok(())
}

pub fn show_config(config: &PipelineConfig) -> Result<()> {
    let output = OutputHandler;
    output.print_header("Configuration");
    output.print_field(
        "Frames",
        if config.cinematics.is_configured() {
            "provider configured"
        } else {
            "placeholders only"
        },
    );
    output.print_field(
        "Voice",
        config
            .voice
            .select_provider()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".into()),
    );
    println!();
    print!("{}", config::redacted_toml(config)?);
    Ok(())
}
