use crate::error::{CoreError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DOCUMENT_VERSION: u32 = 2;
pub const DOCUMENT_KIND: &str = "projectData";

// ---------------------------------------------------------------------------
// Wire documents
// ---------------------------------------------------------------------------

/// Layer-normalized storage document, version 2.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDoc {
    pub version: u32,
    pub kind: String,
    pub layers: Vec<LayerDoc>,
    pub settings: SettingsDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerDoc {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub layer_type: LayerType,
    pub order: usize,
    pub name: String,
    pub is_locked: bool,
    pub is_visible: bool,
    pub clips: Vec<ClipDoc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LayerType {
    Visual,
    Music,
    Voice,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDoc {
    pub active_preset_id: String,
}

/// One stored clip. Times are seconds; unknown fields fall back to the
/// editing defaults so older documents keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClipDoc {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ClipKind,
    pub start: f64,
    pub duration: f64,
    #[serde(default)]
    pub source_duration: Option<f64>,
    #[serde(default)]
    pub media_start_offset: f64,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub text_preset: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default = "default_one")]
    pub volume: f64,
    #[serde(default = "default_one")]
    pub playback_rate: f64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub voice_job: Option<Uuid>,
    #[serde(default)]
    pub resolved: bool,
    /// Only present in legacy flat-array records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_index: Option<usize>,
}

fn default_one() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Timeline <-> document
// ---------------------------------------------------------------------------

pub fn to_document(timeline: &Timeline, settings: &ProjectSettings) -> ProjectDoc {
    let mut layers: Vec<LayerDoc> = timeline
        .layers
        .iter()
        .map(|layer| LayerDoc {
            id: layer.id,
            layer_type: LayerType::Visual,
            order: layer.order,
            name: layer.name.clone(),
            is_locked: layer.locked,
            is_visible: layer.visible,
            clips: layer.clips.iter().map(clip_to_doc).collect(),
        })
        .collect();
    layers.sort_by_key(|l| l.order);

    layers.push(LayerDoc {
        id: Uuid::new_v4(),
        layer_type: LayerType::Music,
        order: layers.len(),
        name: "Music".to_string(),
        is_locked: false,
        is_visible: true,
        clips: timeline.music.clips.iter().map(clip_to_doc).collect(),
    });
    layers.push(LayerDoc {
        id: Uuid::new_v4(),
        layer_type: LayerType::Voice,
        order: layers.len(),
        name: "Voice".to_string(),
        is_locked: false,
        is_visible: true,
        clips: timeline.voice.clips.iter().map(clip_to_doc).collect(),
    });

    ProjectDoc {
        version: DOCUMENT_VERSION,
        kind: DOCUMENT_KIND.to_string(),
        layers,
        settings: SettingsDoc {
            active_preset_id: settings.active_preset_id.clone(),
        },
    }
}

pub fn from_document(doc: ProjectDoc) -> (Timeline, ProjectSettings) {
    let mut timeline = Timeline::new();

    let mut visual: Vec<LayerDoc> = doc
        .layers
        .iter()
        .filter(|l| l.layer_type == LayerType::Visual)
        .cloned()
        .collect();
    visual.sort_by_key(|l| l.order);

    for (order, layer_doc) in visual.into_iter().enumerate() {
        let mut layer = Layer::new(order, layer_doc.name);
        layer.id = layer_doc.id;
        layer.locked = layer_doc.is_locked;
        layer.visible = layer_doc.is_visible;
        layer.clips = layer_doc.clips.iter().map(doc_to_clip).collect();
        timeline.layers.push(layer);
    }

    for layer_doc in &doc.layers {
        match layer_doc.layer_type {
            LayerType::Music => {
                timeline
                    .music
                    .clips
                    .extend(layer_doc.clips.iter().map(doc_to_clip));
            }
            LayerType::Voice => {
                timeline
                    .voice
                    .clips
                    .extend(layer_doc.clips.iter().map(doc_to_clip));
            }
            LayerType::Visual => {}
        }
    }
    timeline.voice.relayout();

    let settings = ProjectSettings {
        active_preset_id: doc.settings.active_preset_id,
    };
    (timeline, settings)
}

fn clip_to_doc(clip: &Clip) -> ClipDoc {
    ClipDoc {
        id: clip.id,
        kind: clip.kind,
        start: clip.start_us.as_seconds(),
        duration: clip.duration_us.as_seconds(),
        source_duration: clip.source_duration_us.map(|t| t.as_seconds()),
        media_start_offset: clip.source_offset_us.as_seconds(),
        source: clip.source.clone(),
        text: clip.text.clone(),
        text_preset: clip.text_preset.clone(),
        transform: clip.transform,
        opacity: clip.opacity,
        volume: clip.volume,
        playback_rate: clip.playback_rate,
        visible: clip.visible,
        muted: clip.muted,
        voice_job: clip.voice_job,
        resolved: clip.resolved,
        layer_index: None,
    }
}

fn doc_to_clip(doc: &ClipDoc) -> Clip {
    let mut clip = Clip::new(doc.kind);
    clip.id = doc.id;
    clip.start_us = TimeUs::from_seconds(doc.start);
    clip.duration_us = TimeUs::from_seconds(doc.duration);
    clip.source_duration_us = doc.source_duration.map(TimeUs::from_seconds);
    clip.source_offset_us = TimeUs::from_seconds(doc.media_start_offset);
    clip.source = doc.source.clone();
    clip.text = doc.text.clone();
    clip.text_preset = doc.text_preset.clone();
    clip.transform = doc.transform;
    clip.opacity = doc.opacity;
    clip.volume = doc.volume;
    clip.playback_rate = doc.playback_rate;
    clip.visible = doc.visible;
    clip.muted = doc.muted;
    clip.voice_job = doc.voice_job;
    clip.resolved = doc.resolved;
    clip
}

// ---------------------------------------------------------------------------
// Loading: current + legacy formats
// ---------------------------------------------------------------------------

/// Parse a stored document in either shape. The current shape is the
/// version-2 layer map; the legacy shape is a bare array of clip records,
/// optionally carrying one `"type": "settings"` pseudo-record.
pub fn parse_document(value: Value) -> Result<ProjectDoc> {
    match &value {
        Value::Object(map) => {
            let version = map.get("version").and_then(Value::as_u64).unwrap_or(0);
            let kind = map.get("kind").and_then(Value::as_str).unwrap_or("");
            if version == DOCUMENT_VERSION as u64 && kind == DOCUMENT_KIND {
                return serde_json::from_value(value).map_err(CoreError::Json);
            }
            Err(CoreError::InvalidDocument(format!(
                "unsupported document: version {version}, kind {kind:?}"
            )))
        }
        Value::Array(records) => normalize_legacy(records),
        _ => Err(CoreError::InvalidDocument(
            "expected an object or a record array".into(),
        )),
    }
}

/// Lift a legacy flat record array into the layer-normalized shape. The
/// visual layer count is inferred from the largest `layerIndex` seen.
fn normalize_legacy(records: &[Value]) -> Result<ProjectDoc> {
    let mut settings = SettingsDoc {
        active_preset_id: ProjectSettings::default().active_preset_id,
    };
    let mut clips: Vec<ClipDoc> = Vec::new();

    for record in records {
        let record_type = record.get("type").and_then(Value::as_str).unwrap_or("");
        if record_type == "settings" {
            if let Some(stored) = record.get("settings") {
                if let Ok(parsed) = serde_json::from_value::<SettingsDoc>(stored.clone()) {
                    settings = parsed;
                }
            }
            continue;
        }
        let mut doc: ClipDoc =
            serde_json::from_value(record.clone()).map_err(CoreError::Json)?;
        if doc.kind == ClipKind::Voice && doc.duration > 100.0 {
            // Old voice records stored milliseconds.
            doc.duration /= 1000.0;
        }
        clips.push(doc);
    }

    let layer_count = clips
        .iter()
        .filter(|c| c.kind.is_visual())
        .filter_map(|c| c.layer_index)
        .max()
        .map(|max| max + 1)
        .unwrap_or(1);

    let mut layers: Vec<LayerDoc> = (0..layer_count)
        .map(|order| LayerDoc {
            id: Uuid::new_v4(),
            layer_type: LayerType::Visual,
            order,
            name: format!("Layer {}", order + 1),
            is_locked: false,
            is_visible: true,
            clips: vec![],
        })
        .collect();
    let mut music = LayerDoc {
        id: Uuid::new_v4(),
        layer_type: LayerType::Music,
        order: layer_count,
        name: "Music".to_string(),
        is_locked: false,
        is_visible: true,
        clips: vec![],
    };
    let mut voice = LayerDoc {
        id: Uuid::new_v4(),
        layer_type: LayerType::Voice,
        order: layer_count + 1,
        name: "Voice".to_string(),
        is_locked: false,
        is_visible: true,
        clips: vec![],
    };

    for clip in clips {
        match clip.kind {
            ClipKind::Music => music.clips.push(clip),
            ClipKind::Voice => voice.clips.push(clip),
            _ => {
                let index = clip.layer_index.unwrap_or(0).min(layer_count - 1);
                layers[index].clips.push(clip);
            }
        }
    }

    layers.push(music);
    layers.push(voice);

    Ok(ProjectDoc {
        version: DOCUMENT_VERSION,
        kind: DOCUMENT_KIND.to_string(),
        layers,
        settings,
    })
}
