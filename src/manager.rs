use crate::assets::{AssetRepository, MATERIAL_EXTENSION};
use crate::backup::{BackupManager, RestoreOutcome};
use crate::cleaner::{CleanupSettings, MaterialCleaner, TickOutcome};
use crate::config::ManagerConfig;
use crate::filter::{self, SearchMode};
use crate::foldout::{FoldoutKind, FoldoutTable};
use crate::index::{MaterialIndex, SceneIndexer, ShaderGroup};
use crate::material::MaterialId;
use crate::scene::SceneGraph;
use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// One editing session over a scene and its material assets.
pub struct MaterialManager<R: AssetRepository, S: SceneGraph> {
    repo: R,
    scene: S,
    config: ManagerConfig,
    indexer: SceneIndexer,
    cleaner: MaterialCleaner,
    foldouts: FoldoutTable,
}

impl<R: AssetRepository, S: SceneGraph> MaterialManager<R, S> {
    pub fn new(repo: R, scene: S, config: ManagerConfig) -> Self {
        let cleaner = MaterialCleaner::new(
            config.cleanup.settings(),
            BackupManager::new(config.cleanup.backup_suffix.clone()),
            config.cleanup.neutral_shader.clone(),
        );
        Self { repo, scene, config, indexer: SceneIndexer::new(), cleaner, foldouts: FoldoutTable::new() }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Mutating the scene invalidates the index; call `refresh` afterwards.
    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn index(&self) -> &MaterialIndex {
        self.indexer.index()
    }

    pub fn cleaner(&self) -> &MaterialCleaner {
        &self.cleaner
    }

    pub fn backups(&self) -> &BackupManager {
        self.cleaner.backups()
    }

    pub fn foldouts(&self) -> &FoldoutTable {
        &self.foldouts
    }

    pub fn foldouts_mut(&mut self) -> &mut FoldoutTable {
        &mut self.foldouts
    }

    pub fn set_include_inactive(&mut self, include_inactive: bool) {
        self.config.scan.include_inactive = include_inactive;
    }

    pub fn set_cleanup_settings(&mut self, settings: CleanupSettings) {
        self.config.cleanup.preview_mode = settings.preview;
        self.config.cleanup.create_backups = settings.create_backups;
        self.cleaner.set_settings(settings);
    }

    pub fn set_search(&mut self, mode: SearchMode, query: impl Into<String>) {
        self.config.search.mode = mode;
        self.config.search.query = query.into();
    }

    /// Rebuilds the index from the scene. Foldout entries whose key no longer
    /// exists are dropped; the rest carry over.
    pub fn refresh(&mut self) -> &MaterialIndex {
        self.indexer.refresh(&self.scene, &self.repo, self.config.scan.include_inactive);
        let index = self.indexer.index();
        self.foldouts.retain(|kind, key| match kind {
            FoldoutKind::ShaderGroup => index.group(key).is_some(),
            FoldoutKind::Properties | FoldoutKind::Textures => index.contains(&MaterialId::new(key)),
        });
        self.indexer.index()
    }

    pub fn summary(&self) -> String {
        self.index().summary()
    }

    /// Groups passing the configured search.
    pub fn visible_groups(&self) -> Vec<&ShaderGroup> {
        let search = &self.config.search;
        filter::visible_groups(self.indexer.index(), &self.scene, search.mode, &search.query).collect()
    }

    /// Entity names under `id` matching the query. Only populated in entity search mode.
    pub fn matching_entities(&self, id: &MaterialId) -> Vec<String> {
        let search = &self.config.search;
        if search.mode != SearchMode::Entity {
            return Vec::new();
        }
        filter::matching_entities(self.indexer.index(), &self.scene, id, &search.query)
    }

    pub fn request_cleanup(&mut self, id: MaterialId) {
        self.cleaner.enqueue([id]);
    }

    /// Queues every indexed material and returns how many were queued.
    pub fn request_clean_all(&mut self) -> usize {
        let ids: Vec<MaterialId> = self.indexer.index().material_ids().cloned().collect();
        let count = ids.len();
        self.cleaner.enqueue(ids);
        count
    }

    pub fn cancel_cleanup(&mut self) -> usize {
        self.cleaner.cancel()
    }

    /// One scheduling step: processes at most one queued material and rebuilds
    /// the index once a batch has drained.
    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.cleaner.tick(&mut self.repo);
        if self.cleaner.take_reindex_request() {
            self.refresh();
        }
        outcome
    }

    pub fn restore_backup(&mut self, id: &MaterialId) -> Result<RestoreOutcome> {
        let asset_path =
            self.repo.asset_path(id).ok_or_else(|| anyhow!("Material '{id}' is not saved as an asset"))?;
        let outcome = self.cleaner.backups().restore(&mut self.repo, &asset_path)?;
        if outcome == RestoreOutcome::Restored {
            self.refresh();
        }
        Ok(outcome)
    }

    /// Restores every indexed material that has a backup.
    pub fn restore_all_backups(&mut self) -> Result<usize> {
        let paths: Vec<PathBuf> =
            self.indexer.index().material_ids().filter_map(|id| self.repo.asset_path(id)).collect();
        let restored = self.cleaner.backups().restore_all(&mut self.repo, paths)?;
        if restored > 0 {
            self.refresh();
        }
        Ok(restored)
    }

    /// Moves a material to another shader; it shows up in its new group at once.
    pub fn assign_shader(&mut self, id: &MaterialId, shader_name: &str) -> Result<()> {
        let shader = self.repo.shader(shader_name).ok_or_else(|| anyhow!("Shader '{shader_name}' not found"))?;
        let material = self.repo.material_mut(id).ok_or_else(|| anyhow!("Material '{id}' not found"))?;
        material.set_shader(&shader);
        self.repo.mark_dirty(id);
        self.refresh();
        Ok(())
    }

    /// Copies a material to the first free `<stem>_<n>.mat` beside it.
    pub fn duplicate(&mut self, id: &MaterialId) -> Result<MaterialId> {
        let source =
            self.repo.asset_path(id).ok_or_else(|| anyhow!("Material '{id}' is not saved as an asset"))?;
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("Material path {} has no file name", source.display()))?
            .to_string();
        let dir = source.parent().map(PathBuf::from).unwrap_or_default();
        let mut counter = 1u32;
        let target = loop {
            let candidate = dir.join(format!("{stem}_{counter}.{MATERIAL_EXTENSION}"));
            if !self.repo.disk_path(&candidate).exists() {
                break candidate;
            }
            counter += 1;
        };
        self.repo.copy_asset(&source, &target)?;
        let new_id = self.repo.load_material(&target)?;
        log::info!("[assets] Duplicated {} to {}", source.display(), target.display());
        self.refresh();
        Ok(new_id)
    }

    /// Texture slots of `id` with a bound texture.
    pub fn used_textures(&self, id: &MaterialId) -> Vec<String> {
        let Some(material) = self.repo.material(id) else {
            return Vec::new();
        };
        match self.repo.shader(material.shader_name()) {
            Some(shader) => material.used_textures(&shader),
            None => Vec::new(),
        }
    }
}
