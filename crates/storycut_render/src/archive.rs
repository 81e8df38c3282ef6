use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use storycut_core::persist::{self, ProjectDoc};
use storycut_core::sanitize;
use storycut_core::types::Project;
use uuid::Uuid;

use crate::error::{RenderError, Result};

pub const MANIFEST_NAME: &str = "project.json";
pub const ASSETS_DIR: &str = "assets";

/// The single manifest document inside an archive bundle. Clip sources in
/// the embedded document are relative `assets/` paths.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveManifest {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub project: ProjectDoc,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Write the project as a self-contained bundle: one manifest plus a flat
/// asset folder. Every referenced source file is copied in; clips sharing
/// a source share the copied file.
pub fn export_archive(project: &Project, dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    let assets_dir = dir.join(ASSETS_DIR);
    std::fs::create_dir_all(&assets_dir)?;

    let mut bundled = project.clone();
    let mut copied: HashMap<String, String> = HashMap::new();

    for layer in &mut bundled.timeline.layers {
        for clip in &mut layer.clips {
            rewrite_source_out(clip, &assets_dir, &mut copied)?;
        }
    }
    for clip in &mut bundled.timeline.music.clips {
        rewrite_source_out(clip, &assets_dir, &mut copied)?;
    }
    for clip in &mut bundled.timeline.voice.clips {
        rewrite_source_out(clip, &assets_dir, &mut copied)?;
    }

    let manifest = ArchiveManifest {
        id: bundled.id,
        title: bundled.title.clone(),
        description: bundled.description.clone(),
        created_at: bundled.created_at,
        updated_at: bundled.updated_at,
        project: persist::to_document(&bundled.timeline, &bundled.settings),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    std::fs::write(dir.join(MANIFEST_NAME), json)?;
    Ok(())
}

fn rewrite_source_out(
    clip: &mut storycut_core::types::Clip,
    assets_dir: &Path,
    copied: &mut HashMap<String, String>,
) -> Result<()> {
    let Some(source) = clip.source.clone() else {
        return Ok(());
    };
    if let Some(relative) = copied.get(&source) {
        clip.source = Some(relative.clone());
        return Ok(());
    }

    let origin = Path::new(&source);
    if !origin.exists() {
        return Err(RenderError::FileNotFound(origin.to_path_buf()));
    }
    let ext = origin
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let name = format!("asset_{:04}.{ext}", copied.len());
    std::fs::copy(origin, assets_dir.join(&name))?;

    let relative = format!("{ASSETS_DIR}/{name}");
    copied.insert(source, relative.clone());
    clip.source = Some(relative);
    Ok(())
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Load a bundle back into an editable project. Relative asset references
/// are resolved against the bundle directory and must exist.
pub fn import_archive(dir: impl AsRef<Path>) -> Result<Project> {
    let dir = dir.as_ref();
    let manifest_path = dir.join(MANIFEST_NAME);
    if !manifest_path.exists() {
        return Err(RenderError::InvalidArchive(format!(
            "missing {MANIFEST_NAME}"
        )));
    }

    let data = std::fs::read_to_string(&manifest_path)?;
    let manifest: ArchiveManifest = serde_json::from_str(&data)
        .map_err(|e| RenderError::InvalidArchive(e.to_string()))?;

    let (mut timeline, settings) = persist::from_document(manifest.project);

    for clip in timeline
        .layers
        .iter_mut()
        .flat_map(|l| l.clips.iter_mut())
        .chain(timeline.music.clips.iter_mut())
        .chain(timeline.voice.clips.iter_mut())
    {
        let Some(source) = clip.source.clone() else {
            continue;
        };
        let local = dir.join(&source);
        if !local.exists() {
            return Err(RenderError::InvalidArchive(format!(
                "missing asset {source}"
            )));
        }
        clip.source = Some(local.to_string_lossy().into_owned());
    }
    sanitize::sanitize_timeline(&mut timeline);

    Ok(Project {
        id: manifest.id,
        title: manifest.title,
        description: manifest.description,
        created_at: manifest.created_at,
        updated_at: manifest.updated_at,
        settings,
        timeline,
    })
}
