use crate::assets::AssetRepository;
use crate::material::MaterialId;
use crate::scene::{EntityKey, SceneGraph};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedMaterial {
    pub id: MaterialId,
    pub name: String,
}

/// Materials sharing one shader, ordered by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderGroup {
    shader: String,
    materials: Vec<GroupedMaterial>,
}

impl ShaderGroup {
    pub fn shader_name(&self) -> &str {
        &self.shader
    }

    pub fn materials(&self) -> &[GroupedMaterial] {
        &self.materials
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn contains(&self, id: &MaterialId) -> bool {
        self.materials.iter().any(|m| &m.id == id)
    }
}

/// Shader grouping and usage lists from one scene scan. Both halves are built
/// together and only ever replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct MaterialIndex {
    groups: Vec<ShaderGroup>,
    usage: BTreeMap<MaterialId, Vec<EntityKey>>,
    revision: u64,
}

impl MaterialIndex {
    /// Groups in shader-name order.
    pub fn groups(&self) -> &[ShaderGroup] {
        &self.groups
    }

    pub fn group(&self, shader: &str) -> Option<&ShaderGroup> {
        self.groups.iter().find(|g| g.shader == shader)
    }

    pub fn group_of(&self, id: &MaterialId) -> Option<&ShaderGroup> {
        self.groups.iter().find(|g| g.contains(id))
    }

    /// Entities referencing `id`, one entry per reference, in scan order.
    pub fn users(&self, id: &MaterialId) -> &[EntityKey] {
        self.usage.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &MaterialId) -> bool {
        self.usage.contains_key(id)
    }

    pub fn material_ids(&self) -> impl Iterator<Item = &MaterialId> {
        self.groups.iter().flat_map(|g| g.materials.iter().map(|m| &m.id))
    }

    pub fn material_count(&self) -> usize {
        self.groups.iter().map(ShaderGroup::len).sum()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn summary(&self) -> String {
        format!("Found {} materials in {} shader groups", self.material_count(), self.group_count())
    }
}

/// Scans `scene` once and builds a fresh index.
///
/// Prefab definitions are skipped, as are inactive entities unless
/// `include_inactive` is set. Empty slots and material ids the repository can
/// no longer resolve are dropped without comment. Every reference an entity
/// holds is recorded, so an entity listing a material twice appears twice.
pub fn reindex<S, R>(scene: &S, repo: &R, include_inactive: bool) -> MaterialIndex
where
    S: SceneGraph + ?Sized,
    R: AssetRepository + ?Sized,
{
    let mut unique: Vec<MaterialId> = Vec::new();
    let mut seen: HashSet<MaterialId> = HashSet::new();
    let mut usage: BTreeMap<MaterialId, Vec<EntityKey>> = BTreeMap::new();

    for renderable in scene.renderables(include_inactive) {
        if renderable.prefab_asset {
            continue;
        }
        if !include_inactive && !renderable.active_in_hierarchy {
            continue;
        }
        for id in renderable.materials.into_iter().flatten() {
            if repo.material(&id).is_none() {
                continue;
            }
            if seen.insert(id.clone()) {
                unique.push(id.clone());
            }
            usage.entry(id).or_default().push(renderable.key);
        }
    }

    let mut by_shader: BTreeMap<String, Vec<GroupedMaterial>> = BTreeMap::new();
    for id in unique {
        let Some(material) = repo.material(&id) else {
            continue;
        };
        by_shader
            .entry(material.shader_name().to_string())
            .or_default()
            .push(GroupedMaterial { id, name: material.name.clone() });
    }

    let groups = by_shader
        .into_iter()
        .map(|(shader, mut materials)| {
            materials.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
            ShaderGroup { shader, materials }
        })
        .collect();

    MaterialIndex { groups, usage, revision: 0 }
}

/// Owns the current index and stamps each rebuild with a new revision.
#[derive(Debug, Default)]
pub struct SceneIndexer {
    current: MaterialIndex,
    revision: u64,
}

impl SceneIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> &MaterialIndex {
        &self.current
    }

    pub fn refresh<S, R>(&mut self, scene: &S, repo: &R, include_inactive: bool) -> &MaterialIndex
    where
        S: SceneGraph + ?Sized,
        R: AssetRepository + ?Sized,
    {
        let mut index = reindex(scene, repo, include_inactive);
        self.revision = self.revision.wrapping_add(1);
        index.revision = self.revision;
        log::debug!("[index] Revision {}: {}", index.revision, index.summary());
        self.current = index;
        &self.current
    }
}
