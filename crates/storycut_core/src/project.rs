use crate::error::{CoreError, Result};
use crate::persist;
use crate::sanitize;
use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Output presets
// ---------------------------------------------------------------------------

/// A render target. Presets are identified by stable string ids stored in
/// the project settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

pub const OUTPUT_PRESETS: &[OutputPreset] = &[
    OutputPreset {
        id: "landscape-1080p",
        label: "Landscape 1080p",
        width: 1920,
        height: 1080,
        fps: 30,
    },
    OutputPreset {
        id: "portrait-1080p",
        label: "Portrait 1080p",
        width: 1080,
        height: 1920,
        fps: 30,
    },
    OutputPreset {
        id: "square-1080",
        label: "Square 1080",
        width: 1080,
        height: 1080,
        fps: 30,
    },
    OutputPreset {
        id: "landscape-720p",
        label: "Landscape 720p",
        width: 1280,
        height: 720,
        fps: 30,
    },
];

/// Look up a preset by id, falling back to the default landscape target
/// for unknown ids.
pub fn resolve_preset(id: &str) -> &'static OutputPreset {
    OUTPUT_PRESETS
        .iter()
        .find(|p| p.id == id)
        .unwrap_or(&OUTPUT_PRESETS[0])
}

// ---------------------------------------------------------------------------
// Project files
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    id: Uuid,
    title: String,
    #[serde(default)]
    description: String,
    created_at: u64,
    updated_at: u64,
    project: Value,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Project {
    /// Create a new empty project with the given title and settings.
    pub fn new(title: impl Into<String>, settings: ProjectSettings) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            settings,
            timeline: Timeline::with_layers(3),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// Save as pretty-printed JSON. Appends the `.storycut` extension when
    /// the path does not already carry it.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = ensure_extension(path.as_ref());
        let file = ProjectFile {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            project: serde_json::to_value(persist::to_document(
                &self.timeline,
                &self.settings,
            ))?,
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a project from a JSON file. The embedded document is accepted
    /// in either the current or the legacy shape and is sanitized before
    /// the project becomes editable.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).map_err(CoreError::Io)?;
        let file: ProjectFile = serde_json::from_str(&data)?;

        let doc = persist::parse_document(file.project)?;
        let (mut timeline, settings) = persist::from_document(doc);
        let report = sanitize::sanitize_timeline(&mut timeline);
        if !report.is_clean() {
            tracing::warn!(
                repaired = report.repaired.len(),
                "repaired invalid clips while loading project"
            );
        }

        Ok(Self {
            id: file.id,
            title: file.title,
            description: file.description,
            created_at: file.created_at,
            updated_at: file.updated_at,
            settings,
            timeline,
        })
    }
}

fn ensure_extension(path: &Path) -> std::path::PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("storycut") {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".storycut");
        p.set_file_name(name);
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_project.storycut");

        let mut project = Project::new("Test Project", ProjectSettings::default());
        let layer_id = project.timeline.layers[0].id;
        project
            .timeline
            .add_clip(
                layer_id,
                Clip::with_span(ClipKind::Video, TimeUs::ZERO, TimeUs(4_000_000)),
            )
            .unwrap();
        project.save_to_file(&path).unwrap();

        let loaded = Project::load_from_file(&path).unwrap();
        assert_eq!(project.id, loaded.id);
        assert_eq!(project.title, loaded.title);
        assert_eq!(project.settings, loaded.settings);
        assert_eq!(project.timeline, loaded.timeline);
    }

    #[test]
    fn save_load_with_all_track_kinds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("populated.storycut");

        let mut project = Project::new("Populated", ProjectSettings::default());
        let layer_id = project.timeline.layers[0].id;
        let mut video = Clip::with_span(ClipKind::Video, TimeUs::ZERO, TimeUs(5_000_000));
        video.source = Some("/media/clip.mp4".to_string());
        video.source_duration_us = Some(TimeUs(10_000_000));
        video.resolved = true;
        project.timeline.add_clip(layer_id, video).unwrap();
        project.timeline.add_music_clip(Clip::with_span(
            ClipKind::Music,
            TimeUs(1_000_000),
            TimeUs(6_000_000),
        ));
        project.timeline.insert_voice_clip(
            None,
            Clip::with_span(ClipKind::Voice, TimeUs::ZERO, TimeUs(2_500_000)),
        );

        project.save_to_file(&path).unwrap();
        let loaded = Project::load_from_file(&path).unwrap();
        assert_eq!(project.timeline, loaded.timeline);
    }

    #[test]
    fn load_repairs_corrupt_durations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.storycut");

        let mut project = Project::new("Corrupt", ProjectSettings::default());
        let layer_id = project.timeline.layers[0].id;
        project
            .timeline
            .add_clip(
                layer_id,
                Clip::with_span(ClipKind::Video, TimeUs::ZERO, TimeUs(3_000_000)),
            )
            .unwrap();
        project.timeline.layers[0].clips[0].duration_us = TimeUs(-500_000);
        project.save_to_file(&path).unwrap();

        let loaded = Project::load_from_file(&path).unwrap();
        let clip = &loaded.timeline.layers[0].clips[0];
        assert_eq!(clip.duration_us, DEFAULT_CLIP_DURATION_US);
        assert!(clip.resolved);
    }

    #[test]
    fn load_nonexistent_file_returns_error() {
        let result = Project::load_from_file("/tmp/does_not_exist_storycut_test.storycut");
        assert!(result.is_err());
    }

    #[test]
    fn extension_appended_if_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_ext");

        let project = Project::new("ExtTest", ProjectSettings::default());
        project.save_to_file(&path).unwrap();

        let expected_path = dir.path().join("no_ext.storycut");
        assert!(expected_path.exists());

        let loaded = Project::load_from_file(&expected_path).unwrap();
        assert_eq!(project.id, loaded.id);
    }

    #[test]
    fn unknown_preset_falls_back_to_default() {
        let preset = resolve_preset("nonsense");
        assert_eq!(preset.id, "landscape-1080p");
        assert_eq!(preset.width, 1920);
        assert_eq!(preset.height, 1080);
    }

    #[test]
    fn preset_values_are_correct() {
        let portrait = resolve_preset("portrait-1080p");
        assert_eq!(portrait.width, 1080);
        assert_eq!(portrait.height, 1920);
        assert_eq!(portrait.fps, 30);

        let square = resolve_preset("square-1080");
        assert_eq!(square.width, 1080);
        assert_eq!(square.height, 1080);

        let p720 = resolve_preset("landscape-720p");
        assert_eq!(p720.width, 1280);
        assert_eq!(p720.height, 720);
    }
}
