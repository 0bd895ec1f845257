use crate::material::Material;
use crate::shader::{PropertyKind, Shader, TILING_SUFFIX};
use glam::{Vec2, Vec4};
use std::collections::BTreeMap;

/// Key suffix under which a texture's offset is captured, next to `<name>_ST`
/// holding its scale.
pub const OFFSET_SUFFIX: &str = "_ST_OFFSET";

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    Color(Vec4),
    Vector(Vec4),
    Float(f32),
    Texture(String),
    TextureScale(Vec2),
    TextureOffset(Vec2),
}

/// Captured property values, keyed by property name. Keys that are absent
/// mean "leave at default", never "reset to zero".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySnapshot {
    values: BTreeMap<String, SnapshotValue>,
}

impl PropertySnapshot {
    pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreStats {
    pub applied: usize,
    /// Keys the material no longer exposes.
    pub dropped: Vec<String>,
}

/// Captures every property `shader` declares that `material` exposes.
pub fn capture(material: &Material, shader: &Shader) -> PropertySnapshot {
    let mut values = BTreeMap::new();
    for prop in &shader.properties {
        let name = prop.name.as_str();
        if !material.has_property(name) {
            continue;
        }
        match prop.kind {
            PropertyKind::Color => {
                values.insert(prop.name.clone(), SnapshotValue::Color(material.color(name)));
            }
            PropertyKind::Vector => {
                values.insert(prop.name.clone(), SnapshotValue::Vector(material.vector(name)));
            }
            PropertyKind::Float | PropertyKind::Range { .. } => {
                values.insert(prop.name.clone(), SnapshotValue::Float(material.float(name)));
            }
            PropertyKind::Texture => {
                if let Some(texture) = material.texture(name) {
                    values.insert(prop.name.clone(), SnapshotValue::Texture(texture.to_string()));
                }
                let tiling = format!("{name}{TILING_SUFFIX}");
                if material.has_property(&tiling) {
                    values.insert(format!("{name}{OFFSET_SUFFIX}"), SnapshotValue::TextureOffset(material.texture_offset(name)));
                    values.insert(tiling, SnapshotValue::TextureScale(material.texture_scale(name)));
                }
            }
        }
    }
    PropertySnapshot { values }
}

/// Writes `snapshot` back into `material`. Keys the material does not expose
/// under its current shader are skipped; tiling keys need both the texture and
/// its `_ST` slot.
pub fn restore(material: &mut Material, snapshot: &PropertySnapshot) -> RestoreStats {
    let mut stats = RestoreStats::default();
    for (key, value) in &snapshot.values {
        let applied = match value {
            SnapshotValue::Color(color) if material.has_property(key) => {
                material.set_color(key, *color);
                true
            }
            SnapshotValue::Vector(vector) if material.has_property(key) => {
                material.set_vector(key, *vector);
                true
            }
            SnapshotValue::Float(value) if material.has_property(key) => {
                material.set_float(key, *value);
                true
            }
            SnapshotValue::Texture(texture) if material.has_property(key) => {
                material.set_texture(key, Some(texture.clone()));
                true
            }
            SnapshotValue::TextureScale(scale) => match key.strip_suffix(TILING_SUFFIX) {
                Some(base) if material.has_property(base) && material.has_property(key) => {
                    material.set_texture_scale(base, *scale);
                    true
                }
                _ => false,
            },
            SnapshotValue::TextureOffset(offset) => match key.strip_suffix(OFFSET_SUFFIX) {
                Some(base)
                    if material.has_property(base)
                        && material.has_property(&format!("{base}{TILING_SUFFIX}")) =>
                {
                    material.set_texture_offset(base, *offset);
                    true
                }
                _ => false,
            },
            _ => false,
        };
        if applied {
            stats.applied += 1;
        } else {
            stats.dropped.push(key.clone());
        }
    }
    stats
}
