use crate::index::{MaterialIndex, ShaderGroup};
use crate::material::MaterialId;
use crate::scene::SceneGraph;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    MaterialAndShader,
    Entity,
}

impl SearchMode {
    pub fn label(self) -> &'static str {
        match self {
            SearchMode::MaterialAndShader => "Search",
            SearchMode::Entity => "Entity Name",
        }
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Whether `group` should be shown for `query`. An empty query matches
/// everything. Entity keys that no longer resolve are ignored.
pub fn matches<S>(group: &ShaderGroup, index: &MaterialIndex, scene: &S, mode: SearchMode, query: &str) -> bool
where
    S: SceneGraph + ?Sized,
{
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    match mode {
        SearchMode::MaterialAndShader => {
            contains_ignore_case(group.shader_name(), &needle)
                || group.materials().iter().any(|m| contains_ignore_case(&m.name, &needle))
        }
        SearchMode::Entity => group.materials().iter().any(|m| {
            index.users(&m.id).iter().any(|key| {
                scene.entity_name(*key).map(|name| contains_ignore_case(name, &needle)).unwrap_or(false)
            })
        }),
    }
}

pub fn visible_groups<'a, S>(
    index: &'a MaterialIndex,
    scene: &'a S,
    mode: SearchMode,
    query: &'a str,
) -> impl Iterator<Item = &'a ShaderGroup> + 'a
where
    S: SceneGraph + ?Sized,
{
    index.groups().iter().filter(move |group| matches(group, index, scene, mode, query))
}

/// Names of live entities using `id` whose name matches `query`, in usage
/// order. An empty query yields nothing.
pub fn matching_entities<S>(index: &MaterialIndex, scene: &S, id: &MaterialId, query: &str) -> Vec<String>
where
    S: SceneGraph + ?Sized,
{
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    index
        .users(id)
        .iter()
        .filter_map(|key| scene.entity_name(*key))
        .filter(|name| contains_ignore_case(name, &needle))
        .map(str::to_string)
        .collect()
}
