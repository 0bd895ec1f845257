use crate::assets::AssetRepository;
use crate::backup::{BackupManager, BackupStatus};
use crate::material::MaterialId;
use crate::snapshot;
use std::collections::VecDeque;
use std::fmt;

/// Steps of the cleanup state machine. `Idle` and `Saving` belong to the
/// cleaner as a whole; the rest are per item, and each `CleanupReport` carries
/// the last one its item entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    /// Also reported for items skipped while resolving path or shaders.
    Idle,
    PreviewOnly,
    BackingUp,
    Clearing,
    ReassigningShader,
    Restoring,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSettings {
    pub preview: bool,
    pub create_backups: bool,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self { preview: true, create_backups: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The material was destroyed after it was queued.
    Missing,
    /// The material has no persisted location.
    NotPersisted,
    MissingShader(String),
    BackupFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Missing => f.write_str("material no longer exists"),
            SkipReason::NotPersisted => f.write_str("it's not saved as an asset"),
            SkipReason::MissingShader(name) => write!(f, "shader '{name}' not found"),
            SkipReason::BackupFailed(err) => write!(f, "backup failed: {err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Previewed { stale: usize },
    Cleaned { backup: Option<BackupStatus>, removed_stale: usize, restored: usize, dropped: usize },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub id: MaterialId,
    pub stage: CleanupStage,
    pub outcome: CleanupOutcome,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub cleaned: usize,
    pub previewed: usize,
    pub skipped: usize,
    pub saved: usize,
    pub save_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Processed(CleanupReport),
    /// The queue drained: `report` is for the last item (absent when the batch
    /// was cancelled) and the batch-level save has run.
    BatchComplete { report: Option<CleanupReport>, summary: BatchSummary },
}

/// FIFO cleanup queue, drained one material per `tick`.
pub struct MaterialCleaner {
    queue: VecDeque<MaterialId>,
    settings: CleanupSettings,
    backups: BackupManager,
    neutral_shader: String,
    summary: BatchSummary,
    batch_open: bool,
    reindex_requested: bool,
}

impl MaterialCleaner {
    pub fn new(settings: CleanupSettings, backups: BackupManager, neutral_shader: impl Into<String>) -> Self {
        Self {
            queue: VecDeque::new(),
            settings,
            backups,
            neutral_shader: neutral_shader.into(),
            summary: BatchSummary::default(),
            batch_open: false,
            reindex_requested: false,
        }
    }

    pub fn settings(&self) -> CleanupSettings {
        self.settings
    }

    /// Takes effect from the next processed item.
    pub fn set_settings(&mut self, settings: CleanupSettings) {
        self.settings = settings;
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && !self.batch_open
    }

    /// `Saving` while a drained or cancelled batch still owes its save on the
    /// next tick, `Idle` otherwise. Items run start to finish inside one tick.
    pub fn stage(&self) -> CleanupStage {
        if self.batch_open && self.queue.is_empty() {
            CleanupStage::Saving
        } else {
            CleanupStage::Idle
        }
    }

    pub fn enqueue<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = MaterialId>,
    {
        self.queue.extend(ids);
    }

    /// Drops every item not yet started. Items already processed in the current
    /// batch are still saved on the next tick.
    pub fn cancel(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        if dropped > 0 {
            log::info!("[cleanup] Cancelled {dropped} queued material(s)");
        }
        dropped
    }

    /// True once per drained batch; the caller should rebuild its index.
    pub fn take_reindex_request(&mut self) -> bool {
        std::mem::take(&mut self.reindex_requested)
    }

    pub fn tick<R>(&mut self, repo: &mut R) -> TickOutcome
    where
        R: AssetRepository + ?Sized,
    {
        let Some(id) = self.queue.pop_front() else {
            if self.batch_open {
                let summary = self.finish_batch(repo);
                return TickOutcome::BatchComplete { report: None, summary };
            }
            return TickOutcome::Idle;
        };
        self.batch_open = true;
        let report = self.process(repo, id);
        match report.outcome {
            CleanupOutcome::Previewed { .. } => self.summary.previewed += 1,
            CleanupOutcome::Cleaned { .. } => self.summary.cleaned += 1,
            CleanupOutcome::Skipped(_) => self.summary.skipped += 1,
        }
        if self.queue.is_empty() {
            let summary = self.finish_batch(repo);
            return TickOutcome::BatchComplete { report: Some(report), summary };
        }
        TickOutcome::Processed(report)
    }

    fn finish_batch<R>(&mut self, repo: &mut R) -> BatchSummary
    where
        R: AssetRepository + ?Sized,
    {
        let mut summary = std::mem::take(&mut self.summary);
        if summary.cleaned > 0 {
            let report = repo.save_assets();
            summary.saved = report.written;
            if !report.is_ok() {
                log::warn!("[cleanup] {} cleaned material(s) were not saved", report.failures.len());
                summary.save_error = Some(report.failures.join("; "));
            }
        }
        self.batch_open = false;
        self.reindex_requested = true;
        log::info!(
            "[cleanup] Batch finished: {} cleaned, {} previewed, {} skipped",
            summary.cleaned,
            summary.previewed,
            summary.skipped
        );
        summary
    }

    fn skip(id: MaterialId, name: &str, stage: CleanupStage, reason: SkipReason) -> CleanupReport {
        let message = format!("Cannot clean material {name} - {reason}");
        match reason {
            SkipReason::Missing => log::debug!("[cleanup] {message}"),
            _ => log::warn!("[cleanup] {message}"),
        }
        CleanupReport { id, stage, outcome: CleanupOutcome::Skipped(reason), message }
    }

    fn process<R>(&mut self, repo: &mut R, id: MaterialId) -> CleanupReport
    where
        R: AssetRepository + ?Sized,
    {
        let Some(material) = repo.material(&id) else {
            let name = id.to_string();
            return Self::skip(id, &name, CleanupStage::Idle, SkipReason::Missing);
        };
        let name = material.name.clone();

        if self.settings.preview {
            let stale = material.stale_properties().len();
            let message = format!("Preview Mode: Would clean {name} ({stale} unused entries)");
            log::info!("[cleanup] {message}");
            return CleanupReport {
                id,
                stage: CleanupStage::PreviewOnly,
                outcome: CleanupOutcome::Previewed { stale },
                message,
            };
        }

        // Everything that can fail is resolved before the storage is touched.
        let Some(asset_path) = repo.asset_path(&id) else {
            return Self::skip(id, &name, CleanupStage::Idle, SkipReason::NotPersisted);
        };
        let shader_name = material.shader_name().to_string();
        let Some(shader) = repo.shader(&shader_name) else {
            return Self::skip(id, &name, CleanupStage::Idle, SkipReason::MissingShader(shader_name));
        };
        let Some(neutral) = repo.shader(&self.neutral_shader) else {
            let neutral_name = self.neutral_shader.clone();
            return Self::skip(id, &name, CleanupStage::Idle, SkipReason::MissingShader(neutral_name));
        };

        let backup = if self.settings.create_backups {
            match self.backups.create(repo, &asset_path) {
                Ok(status) => Some(status),
                Err(err) => {
                    let reason = SkipReason::BackupFailed(format!("{err:#}"));
                    return Self::skip(id, &name, CleanupStage::BackingUp, reason);
                }
            }
        } else {
            None
        };

        let Some(material) = repo.material_mut(&id) else {
            return Self::skip(id, &name, CleanupStage::Clearing, SkipReason::Missing);
        };
        let captured = snapshot::capture(material, &shader);

        let removed_stale = material.stale_properties().len();
        material.clear_saved_properties();

        // The exposed-property cache only resets on assignment, hence the round trip.
        material.set_shader(&neutral);
        material.set_shader(&shader);

        let stats = snapshot::restore(material, &captured);
        repo.mark_dirty(&id);

        let message = format!(
            "Cleaned {name}: kept {} values, removed {removed_stale} unused entries",
            stats.applied
        );
        log::info!("[cleanup] {message}");
        CleanupReport {
            id,
            stage: CleanupStage::Restoring,
            outcome: CleanupOutcome::Cleaned {
                backup,
                removed_stale,
                restored: stats.applied,
                dropped: stats.dropped.len(),
            },
            message,
        }
    }
}
