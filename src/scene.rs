use crate::material::MaterialId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Weak handle to a scene entity. It stays valid only as long as the entity
/// does; lookups through a stale key come back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey(u64);

impl EntityKey {
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

/// One renderable as seen by a scene scan.
#[derive(Debug, Clone)]
pub struct RenderableEntity {
    pub key: EntityKey,
    pub active_in_hierarchy: bool,
    /// Part of a prefab/template definition rather than a live instance.
    pub prefab_asset: bool,
    /// One slot per sub-mesh; `None` marks an empty slot.
    pub materials: Vec<Option<MaterialId>>,
}

pub trait SceneGraph {
    /// Renderables in scan order. With `include_inactive == false` entities that
    /// are inactive in the hierarchy are left out.
    fn renderables(&self, include_inactive: bool) -> Vec<RenderableEntity>;

    /// Current name of a live entity.
    fn entity_name(&self, key: EntityKey) -> Option<&str>;
}

const fn default_active() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub entities: Vec<SceneEntity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEntity {
    pub name: String,
    #[serde(default = "default_active", skip_serializing_if = "is_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub prefab_asset: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<RendererData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RendererData {
    #[serde(default)]
    pub materials: Vec<Option<MaterialId>>,
}

impl SceneEntity {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), active: true, parent: None, prefab_asset: false, renderer: None }
    }

    pub fn with_materials<I, M>(mut self, materials: I) -> Self
    where
        I: IntoIterator<Item = Option<M>>,
        M: Into<MaterialId>,
    {
        self.renderer =
            Some(RendererData { materials: materials.into_iter().map(|m| m.map(Into::into)).collect() });
        self
    }
}

impl Scene {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading scene file {}", path.display()))?;
        let scene = serde_json::from_slice::<Scene>(&bytes)
            .with_context(|| format!("Parsing scene file {}", path.display()))?;
        Ok(scene)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating scene directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing scene file {}", path.display()))?;
        Ok(())
    }
}
