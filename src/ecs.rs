use crate::material::MaterialId;
use crate::scene::{EntityKey, RenderableEntity, Scene, SceneGraph};
use anyhow::{anyhow, Result};
use bevy_ecs::prelude::*;

// ---------- Components ----------
#[derive(Component, Clone)]
pub struct EntityName(pub String);
#[derive(Component, Clone, Copy)]
pub struct Active(pub bool);
#[derive(Component, Clone, Copy, Default)]
pub struct ParentEntity(pub Option<Entity>);
/// Marks entities that belong to a prefab definition instead of the live scene.
#[derive(Component, Clone, Copy, Default)]
pub struct PrefabAsset(pub bool);
#[derive(Component, Clone, Default)]
pub struct MeshRenderer {
    pub materials: Vec<Option<MaterialId>>,
}

/// Scene graph backed by a bevy_ecs world.
pub struct EcsScene {
    pub world: World,
}

impl Default for EcsScene {
    fn default() -> Self {
        Self::new()
    }
}

impl EcsScene {
    pub fn new() -> Self {
        Self { world: World::new() }
    }

    pub fn key(entity: Entity) -> EntityKey {
        EntityKey::from_bits(entity.to_bits())
    }

    pub fn entity(key: EntityKey) -> Option<Entity> {
        Entity::try_from_bits(key.to_bits()).ok()
    }

    /// Spawns a plain transform-only node, useful as a parent.
    pub fn spawn_node(&mut self, name: impl Into<String>) -> Entity {
        self.world
            .spawn((EntityName(name.into()), Active(true), ParentEntity::default(), PrefabAsset::default()))
            .id()
    }

    pub fn spawn_renderer<I>(&mut self, name: impl Into<String>, materials: I) -> Entity
    where
        I: IntoIterator<Item = Option<MaterialId>>,
    {
        self.world
            .spawn((
                EntityName(name.into()),
                Active(true),
                ParentEntity::default(),
                PrefabAsset::default(),
                MeshRenderer { materials: materials.into_iter().collect() },
            ))
            .id()
    }

    pub fn set_active(&mut self, entity: Entity, active: bool) -> bool {
        match self.world.get_mut::<Active>(entity) {
            Some(mut flag) => {
                flag.0 = active;
                true
            }
            None => false,
        }
    }

    pub fn set_parent(&mut self, child: Entity, parent: Option<Entity>) -> bool {
        match self.world.get_mut::<ParentEntity>(child) {
            Some(mut link) => {
                link.0 = parent;
                true
            }
            None => false,
        }
    }

    pub fn set_prefab_asset(&mut self, entity: Entity, prefab: bool) -> bool {
        match self.world.get_mut::<PrefabAsset>(entity) {
            Some(mut flag) => {
                flag.0 = prefab;
                true
            }
            None => false,
        }
    }

    pub fn set_name(&mut self, entity: Entity, name: impl Into<String>) -> bool {
        match self.world.get_mut::<EntityName>(entity) {
            Some(mut current) => {
                current.0 = name.into();
                true
            }
            None => false,
        }
    }

    pub fn set_materials<I>(&mut self, entity: Entity, materials: I) -> bool
    where
        I: IntoIterator<Item = Option<MaterialId>>,
    {
        match self.world.get_mut::<MeshRenderer>(entity) {
            Some(mut renderer) => {
                renderer.materials = materials.into_iter().collect();
                true
            }
            None => false,
        }
    }

    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.world.entities().len() as usize
    }

    /// Active itself and every ancestor active. A missing `Active` counts as active.
    pub fn active_in_hierarchy(&self, entity: Entity) -> bool {
        self.hierarchy_active(entity, self.entity_count())
    }

    /// A parent chain longer than `limit` can only be a cycle.
    fn hierarchy_active(&self, entity: Entity, limit: usize) -> bool {
        let mut current = Some(entity);
        let mut depth = 0;
        while let Some(e) = current {
            if !self.world.get::<Active>(e).map(|a| a.0).unwrap_or(true) {
                return false;
            }
            depth += 1;
            if depth > limit {
                // Parent cycle; treat the chain as inactive rather than loop.
                return false;
            }
            current = self.world.get::<ParentEntity>(e).and_then(|p| p.0);
        }
        true
    }

    /// Spawns every entity of `scene` and links parents. Returns the spawned
    /// entities in file order.
    pub fn load_scene(&mut self, scene: &Scene) -> Result<Vec<Entity>> {
        let mut spawned = Vec::with_capacity(scene.entities.len());
        for data in &scene.entities {
            let entity = match &data.renderer {
                Some(renderer) => self.spawn_renderer(data.name.clone(), renderer.materials.iter().cloned()),
                None => self.spawn_node(data.name.clone()),
            };
            self.set_active(entity, data.active);
            self.set_prefab_asset(entity, data.prefab_asset);
            spawned.push(entity);
        }
        for (index, data) in scene.entities.iter().enumerate() {
            if let Some(parent_index) = data.parent {
                let parent = *spawned.get(parent_index).ok_or_else(|| {
                    anyhow!(
                        "Scene entity '{}' has parent index {parent_index} outside entity list",
                        data.name
                    )
                })?;
                self.set_parent(spawned[index], Some(parent));
            }
        }
        Ok(spawned)
    }
}

impl SceneGraph for EcsScene {
    fn renderables(&self, include_inactive: bool) -> Vec<RenderableEntity> {
        let limit = self.entity_count();
        let mut found: Vec<(Entity, RenderableEntity)> = self
            .world
            .iter_entities()
            .filter_map(|entity_ref| {
                let renderer = entity_ref.get::<MeshRenderer>()?;
                let entity = entity_ref.id();
                let active_in_hierarchy = self.hierarchy_active(entity, limit);
                if !include_inactive && !active_in_hierarchy {
                    return None;
                }
                let prefab_asset = entity_ref.get::<PrefabAsset>().map(|p| p.0).unwrap_or(false);
                Some((
                    entity,
                    RenderableEntity {
                        key: Self::key(entity),
                        active_in_hierarchy,
                        prefab_asset,
                        materials: renderer.materials.clone(),
                    },
                ))
            })
            .collect();
        // Archetype order is not spawn order; sort so scans are reproducible.
        found.sort_by_key(|(entity, _)| (entity.index(), entity.generation()));
        found.into_iter().map(|(_, renderable)| renderable).collect()
    }

    fn entity_name(&self, key: EntityKey) -> Option<&str> {
        let entity = Self::entity(key)?;
        self.world.get::<EntityName>(entity).map(|n| n.0.as_str())
    }
}
