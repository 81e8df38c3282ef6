use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use storycut_core::persist::{self, ClipDoc};
use storycut_core::project::resolve_preset;
use storycut_core::sanitize;
use storycut_core::types::{ProjectSettings, Timeline};
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::export::{self, ExportProgress};
use crate::probe;
use crate::segment::RenderSettings;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One render job as submitted by a client: a flat clip list plus output
/// settings. Clips use the same wire shape as stored documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(default)]
    pub preset_id: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<u32>,
    pub clips: Vec<ClipDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderRequest {
    /// Resolve the effective output geometry: explicit fields win, then the
    /// named preset, then the default preset.
    pub fn settings(&self) -> RenderSettings {
        let preset = resolve_preset(self.preset_id.as_deref().unwrap_or(""));
        RenderSettings {
            width: self.width.unwrap_or(preset.width),
            height: self.height.unwrap_or(preset.height),
            fps: self.fps.unwrap_or(preset.fps),
        }
    }

    /// Lift the flat clip list into an editable timeline. The list shares
    /// the legacy record layout, so it goes through the same normalization
    /// and repair path as loaded documents.
    pub fn timeline(&self) -> Result<Timeline> {
        let records = serde_json::to_value(&self.clips)?;
        let doc = persist::parse_document(records)?;
        let (mut timeline, _settings): (Timeline, ProjectSettings) = persist::from_document(doc);
        sanitize::sanitize_timeline(&mut timeline);
        Ok(timeline)
    }
}

// ---------------------------------------------------------------------------
// Job execution
// ---------------------------------------------------------------------------

/// Run one render job end to end: normalize, probe unresolved sources,
/// export, and return the finished file as base64. All failures collapse
/// into a diagnostic response rather than a transport error.
pub async fn handle_request(
    request: RenderRequest,
    progress_tx: watch::Sender<ExportProgress>,
    cancel: Arc<AtomicBool>,
) -> RenderResponse {
    match render_to_base64(request, progress_tx, cancel).await {
        Ok(payload) => RenderResponse {
            ok: true,
            video_base64: Some(payload),
            error: None,
        },
        Err(err) => {
            tracing::error!(error = %err, "render job failed");
            RenderResponse {
                ok: false,
                video_base64: None,
                error: Some(err.to_string()),
            }
        }
    }
}

async fn render_to_base64(
    request: RenderRequest,
    progress_tx: watch::Sender<ExportProgress>,
    cancel: Arc<AtomicBool>,
) -> Result<String> {
    let settings = request.settings();
    let mut timeline = request.timeline()?;
    probe::resolve_timeline(&mut timeline).await;

    let job_id = Uuid::new_v4();
    let work_dir = std::env::temp_dir().join(format!("storycut-render-{job_id}"));
    let output: PathBuf = std::env::temp_dir().join(format!("storycut-out-{job_id}.mp4"));

    let result = export::export(
        &timeline, &settings, &output, &work_dir, progress_tx, cancel,
    )
    .await;

    let payload = match result {
        Ok(()) => {
            let bytes = std::fs::read(&output)?;
            Ok(BASE64.encode(bytes))
        }
        Err(err) => Err(err),
    };
    if output.exists() {
        let _ = std::fs::remove_file(&output);
    }
    payload
}
