use crate::types::Project;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

pub const AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(800);

struct Snapshot {
    project: Project,
    path: PathBuf,
}

/// Debounced background persistence. Every committed edit requests a save;
/// a burst of requests collapses into one write of the newest snapshot.
/// Saves are fire-and-forget: failures are logged, never surfaced to the
/// editing path.
pub struct Autosave {
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl Autosave {
    pub fn spawn(debounce: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Snapshot>();
        tokio::spawn(async move {
            while let Some(mut pending) = rx.recv().await {
                // Hold the write until the burst settles, keeping only the
                // newest snapshot.
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(debounce) => break,
                        next = rx.recv() => match next {
                            Some(snapshot) => pending = snapshot,
                            None => break,
                        },
                    }
                }
                if let Err(err) = pending.project.save_to_file(&pending.path) {
                    tracing::error!(error = %err, path = %pending.path.display(), "autosave failed");
                }
            }
        });
        Self { tx }
    }

    /// Queue a save of the given state. Never blocks the caller.
    pub fn request(&self, project: &Project, path: impl Into<PathBuf>) {
        let snapshot = Snapshot {
            project: project.clone(),
            path: path.into(),
        };
        // A closed channel means the runtime is shutting down; drop the save.
        let _ = self.tx.send(snapshot);
    }
}
