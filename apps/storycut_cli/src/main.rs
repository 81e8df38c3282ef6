//! storycut CLI.
//!
//! Usage:
//!   storycut new <NAME>            Create an empty project
//!   storycut info <PATH>           Show project information
//!   storycut probe <MEDIA>         Probe a media file
//!   storycut resolve <PATH>        Probe and resolve placeholder clips
//!   storycut export <PATH>         Render a project to video
//!   storycut bundle <PATH> <DIR>   Pack a project and its media into a bundle
//!   storycut unbundle <DIR>        Restore a project from a bundle

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use storycut_core::project::{resolve_preset, OUTPUT_PRESETS};
use storycut_core::types::{Project, ProjectSettings};
use storycut_render::archive;
use storycut_render::export::{export, ExportProgress};
use storycut_render::probe;
use storycut_render::segment::RenderSettings;
use tokio::sync::watch;

#[derive(Parser)]
#[command(
    name = "storycut",
    about = "Multi-track timeline editing and rendering",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty project
    New {
        /// Project name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Output preset id
        #[arg(long, default_value = "landscape-1080p")]
        preset: String,
    },

    /// Show project information
    Info {
        /// Path to the project file
        path: PathBuf,
    },

    /// Probe a media file
    Probe {
        /// Path to the media file
        path: PathBuf,
    },

    /// Probe and resolve every placeholder clip in a project
    Resolve {
        /// Path to the project file
        path: PathBuf,
    },

    /// Render a project to video
    Export {
        /// Path to the project file
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override the project's output preset
        #[arg(long)]
        preset: Option<String>,
    },

    /// Pack a project and its media into a bundle directory
    Bundle {
        /// Path to the project file
        path: PathBuf,

        /// Bundle directory to create
        dir: PathBuf,
    },

    /// Restore a project from a bundle directory
    Unbundle {
        /// Bundle directory
        dir: PathBuf,

        /// Where to write the restored project file
        #[arg(short, long, default_value = "restored.storycut")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::New {
            name,
            output,
            preset,
        } => {
            if !OUTPUT_PRESETS.iter().any(|p| p.id == preset) {
                anyhow::bail!("unknown preset {preset:?}");
            }
            let project = Project::new(
                &name,
                ProjectSettings {
                    active_preset_id: preset,
                },
            );
            let path = output.join(&name);
            project.save_to_file(&path).context("saving project")?;
            println!("created {name}.storycut");
            Ok(())
        }

        Commands::Info { path } => {
            let project = Project::load_from_file(&path).context("loading project")?;
            let clip_count = project.timeline.all_clips().count();
            let preset = resolve_preset(&project.settings.active_preset_id);
            println!("title:    {}", project.title);
            println!("preset:   {} ({}x{} @ {} fps)", preset.id, preset.width, preset.height, preset.fps);
            println!("layers:   {}", project.timeline.layers.len());
            println!("clips:    {clip_count}");
            println!("duration: {}", project.timeline.max_content_time_us());
            Ok(())
        }

        Commands::Probe { path } => {
            let info = probe::probe_media(&path).await.context("probing media")?;
            println!("kind:     {:?}", probe::detect_media_kind(&path, &info));
            println!("duration: {}", info.duration_us);
            println!("video:    {}x{} @ {:.2} fps", info.width, info.height, info.fps);
            println!("audio:    {} channel(s)", info.audio_channels);
            Ok(())
        }

        Commands::Resolve { path } => {
            let mut project = Project::load_from_file(&path).context("loading project")?;
            let changed = probe::resolve_timeline(&mut project.timeline).await;
            if changed > 0 {
                project.touch();
                project.save_to_file(&path).context("saving project")?;
            }
            println!("resolved {changed} clip(s)");
            Ok(())
        }

        Commands::Export {
            path,
            output,
            preset,
        } => {
            let project = Project::load_from_file(&path).context("loading project")?;
            let preset_id = preset.unwrap_or(project.settings.active_preset_id.clone());
            let preset = resolve_preset(&preset_id);
            let settings = RenderSettings {
                width: preset.width,
                height: preset.height,
                fps: preset.fps,
            };
            let output = output.unwrap_or_else(|| path.with_extension("mp4"));
            let work_dir = std::env::temp_dir().join(format!("storycut-export-{}", project.id));

            let (tx, mut rx) = watch::channel(ExportProgress::default());
            let printer = tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let progress = *rx.borrow();
                    eprint!("\r{:?} {:5.1}%", progress.stage, progress.percent);
                }
                eprintln!();
            });

            let result = export(
                &project.timeline,
                &settings,
                &output,
                &work_dir,
                tx,
                Arc::new(AtomicBool::new(false)),
            )
            .await;
            let _ = printer.await;
            result.context("export failed")?;
            println!("wrote {}", output.display());
            Ok(())
        }

        Commands::Bundle { path, dir } => {
            let project = Project::load_from_file(&path).context("loading project")?;
            archive::export_archive(&project, &dir).context("writing bundle")?;
            println!("bundled into {}", dir.display());
            Ok(())
        }

        Commands::Unbundle { dir, output } => {
            let project = archive::import_archive(&dir).context("reading bundle")?;
            project.save_to_file(&output).context("saving project")?;
            println!("restored {}", project.title);
            Ok(())
        }
    }
}
