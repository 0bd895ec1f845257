use crate::material::{Material, MaterialId};
use crate::shader::{Shader, ShaderLibrary};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const MATERIAL_EXTENSION: &str = "mat";
pub const SHADER_EXTENSION: &str = "shader";

const TRANSIENT_PREFIX: &str = "transient://";

/// Persisted material assets plus the shader schemas they refer to.
///
/// Asset paths handed across this trait are project-relative; `disk_path` maps
/// them onto the filesystem.
pub trait AssetRepository {
    fn material(&self, id: &MaterialId) -> Option<&Material>;

    fn material_mut(&mut self, id: &MaterialId) -> Option<&mut Material>;

    fn shader(&self, name: &str) -> Option<Arc<Shader>>;

    /// Project-relative path of a persisted material, `None` for transient ones.
    fn asset_path(&self, id: &MaterialId) -> Option<PathBuf>;

    fn disk_path(&self, asset_path: &Path) -> PathBuf;

    fn copy_asset(&mut self, src: &Path, dst: &Path) -> Result<()>;

    fn mark_dirty(&mut self, id: &MaterialId);

    /// Writes every dirty persisted material. A material stays dirty until its
    /// write succeeds.
    fn save_assets(&mut self) -> SaveReport;

    fn load_material(&mut self, asset_path: &Path) -> Result<MaterialId>;

    /// Re-imports the given materials from disk, dropping their in-memory state.
    /// Every other material is left alone.
    fn reload(&mut self, asset_paths: &[PathBuf]) -> Result<()>;

    /// Re-reads assets after files were changed behind the repository's back.
    /// Dirty materials keep their unsaved state.
    fn refresh(&mut self) -> Result<()>;
}

/// Result of one `save_assets` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: usize,
    /// One message per material that could not be written.
    pub failures: Vec<String>,
}

impl SaveReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_result(self) -> Result<usize> {
        if self.failures.is_empty() {
            Ok(self.written)
        } else {
            bail!("{} material(s) failed to save: {}", self.failures.len(), self.failures.join("; "))
        }
    }
}

struct MaterialRecord {
    material: Material,
    path: Option<PathBuf>,
}

pub struct AssetDatabase {
    root: PathBuf,
    shaders: ShaderLibrary,
    materials: BTreeMap<MaterialId, MaterialRecord>,
    dirty: BTreeSet<MaterialId>,
    transient_counter: u64,
}

impl AssetDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            shaders: ShaderLibrary::new(),
            materials: BTreeMap::new(),
            dirty: BTreeSet::new(),
            transient_counter: 0,
        }
    }

    /// Opens a project directory, importing every `.shader` and `.mat` file under it.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let mut db = Self::new(root);
        db.refresh()?;
        Ok(db)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shaders(&self) -> &ShaderLibrary {
        &self.shaders
    }

    pub fn register_shader(&mut self, shader: Shader) -> Arc<Shader> {
        self.shaders.register(shader)
    }

    /// Writes `material` to `asset_path` and imports it.
    pub fn create_material(&mut self, asset_path: impl AsRef<Path>, material: Material) -> Result<MaterialId> {
        let asset_path = asset_path.as_ref();
        material.save_to_path(self.disk_path(asset_path))?;
        self.load_material(asset_path)
    }

    /// Registers a material that has no persisted location.
    pub fn insert_transient(&mut self, mut material: Material) -> MaterialId {
        self.transient_counter += 1;
        let id = MaterialId::new(format!("{TRANSIENT_PREFIX}{}#{}", material.name, self.transient_counter));
        self.bind(&mut material);
        self.materials.insert(id.clone(), MaterialRecord { material, path: None });
        id
    }

    /// Drops a material from memory, as if it was destroyed. Files are untouched.
    pub fn unload(&mut self, id: &MaterialId) -> Option<Material> {
        self.dirty.remove(id);
        self.materials.remove(id).map(|record| record.material)
    }

    pub fn is_dirty(&self, id: &MaterialId) -> bool {
        self.dirty.contains(id)
    }

    pub fn material_ids(&self) -> impl Iterator<Item = &MaterialId> {
        self.materials.keys()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    fn bind(&self, material: &mut Material) {
        match self.shaders.get(material.shader_name()) {
            Some(shader) => material.set_shader(&shader),
            None => {
                log::warn!(
                    "[assets] Material '{}' uses unknown shader '{}'",
                    material.name,
                    material.shader_name()
                );
                material.unbind_shader();
            }
        }
    }

    fn import_material(&mut self, asset_path: &Path) -> Result<MaterialId> {
        let disk = self.disk_path(asset_path);
        let mut material = Material::load_from_path(&disk)?;
        // Asset names follow the file name, like any other imported asset.
        if let Some(stem) = asset_path.file_stem().and_then(|s| s.to_str()) {
            material.name = stem.to_string();
        }
        self.bind(&mut material);
        let id = MaterialId::from_asset_path(asset_path);
        self.dirty.remove(&id);
        self.materials.insert(id.clone(), MaterialRecord { material, path: Some(asset_path.to_path_buf()) });
        Ok(id)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("Scanning assets under {}", dir.display()))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

impl AssetRepository for AssetDatabase {
    fn material(&self, id: &MaterialId) -> Option<&Material> {
        self.materials.get(id).map(|record| &record.material)
    }

    fn material_mut(&mut self, id: &MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id).map(|record| &mut record.material)
    }

    fn shader(&self, name: &str) -> Option<Arc<Shader>> {
        self.shaders.get(name)
    }

    fn asset_path(&self, id: &MaterialId) -> Option<PathBuf> {
        self.materials.get(id).and_then(|record| record.path.clone())
    }

    fn disk_path(&self, asset_path: &Path) -> PathBuf {
        self.root.join(asset_path)
    }

    fn copy_asset(&mut self, src: &Path, dst: &Path) -> Result<()> {
        let from = self.disk_path(src);
        let to = self.disk_path(dst);
        if !from.is_file() {
            bail!("Cannot copy {}: source asset does not exist", src.display());
        }
        if to.exists() {
            bail!("Cannot copy {} to {}: destination already exists", src.display(), dst.display());
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Creating directory {}", parent.display()))?;
        }
        fs::copy(&from, &to)
            .with_context(|| format!("Copying asset {} to {}", src.display(), dst.display()))?;
        Ok(())
    }

    fn mark_dirty(&mut self, id: &MaterialId) {
        if self.materials.contains_key(id) {
            self.dirty.insert(id.clone());
        }
    }

    fn save_assets(&mut self) -> SaveReport {
        let mut report = SaveReport::default();
        let pending: Vec<MaterialId> = self.dirty.iter().cloned().collect();
        for id in pending {
            let Some(record) = self.materials.get(&id) else {
                self.dirty.remove(&id);
                continue;
            };
            let Some(path) = record.path.as_ref() else {
                log::debug!("[assets] Skipping save of transient material '{}'", record.material.name);
                self.dirty.remove(&id);
                continue;
            };
            match record.material.save_to_path(self.root.join(path)) {
                Ok(()) => {
                    self.dirty.remove(&id);
                    report.written += 1;
                }
                Err(err) => {
                    log::warn!("[assets] Could not save {id}: {err:#}");
                    report.failures.push(format!("{id}: {err:#}"));
                }
            }
        }
        if report.written > 0 {
            log::info!("[assets] Saved {} material asset(s)", report.written);
        }
        report
    }

    fn load_material(&mut self, asset_path: &Path) -> Result<MaterialId> {
        self.import_material(asset_path)
    }

    fn reload(&mut self, asset_paths: &[PathBuf]) -> Result<()> {
        let mut failed = Vec::new();
        for asset_path in asset_paths {
            if let Err(err) = self.import_material(asset_path) {
                failed.push(format!("{err:#}"));
            }
        }
        if !failed.is_empty() {
            bail!("{} of {} material(s) failed to reload: {}", failed.len(), asset_paths.len(), failed.join("; "));
        }
        log::debug!("[assets] Reloaded {} material(s)", asset_paths.len());
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        if !self.root.is_dir() {
            bail!("Asset root {} is not a directory", self.root.display());
        }
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();

        for file in files.iter().filter(|f| has_extension(f, SHADER_EXTENSION)) {
            match Shader::load_from_path(file) {
                Ok(shader) => {
                    self.shaders.register(shader);
                }
                Err(err) => log::warn!("[assets] Skipping shader {}: {err:?}", self.relative(file).display()),
            }
        }

        let mut seen = BTreeSet::new();
        for file in files.iter().filter(|f| has_extension(f, MATERIAL_EXTENSION)) {
            let asset_path = self.relative(file);
            let id = MaterialId::from_asset_path(&asset_path);
            if self.dirty.contains(&id) && self.materials.contains_key(&id) {
                seen.insert(id);
                continue;
            }
            match self.import_material(&asset_path) {
                Ok(id) => {
                    seen.insert(id);
                }
                Err(err) => log::warn!("[assets] Skipping material {}: {err:?}", asset_path.display()),
            }
        }

        // Persisted records whose file vanished are gone; transient ones stay.
        let vanished: Vec<MaterialId> = self
            .materials
            .iter()
            .filter(|(id, record)| record.path.is_some() && !seen.contains(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in vanished {
            self.dirty.remove(&id);
            self.materials.remove(&id);
        }

        // Shader files may have changed; rebind the materials kept in memory too.
        let shaders = self.shaders.clone();
        let dirty = &self.dirty;
        for (_, record) in self.materials.iter_mut().filter(|(id, record)| record.path.is_none() || dirty.contains(*id)) {
            if let Some(shader) = shaders.get(record.material.shader_name()) {
                record.material.set_shader(&shader);
            }
        }
        log::debug!("[assets] Refreshed {} material(s) under {}", self.materials.len(), self.root.display());
        Ok(())
    }
}
