use anyhow::{Context, Result};
use glam::Vec4;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Suffix of the implicit scale/offset property that accompanies a texture slot.
pub const TILING_SUFFIX: &str = "_ST";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Color,
    Vector,
    Float,
    Range { min: f32, max: f32 },
    Texture,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyDefault {
    Scalar(f32),
    Vector([f32; 4]),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderProperty {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<PropertyDefault>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_scale_offset: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ShaderProperty {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self { name: name.into(), kind, default: None, no_scale_offset: false }
    }

    pub fn color(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Color)
    }

    pub fn vector(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Vector)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Float)
    }

    pub fn range(name: impl Into<String>, min: f32, max: f32) -> Self {
        Self::new(name, PropertyKind::Range { min, max })
    }

    pub fn texture(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::Texture)
    }

    pub fn with_default(mut self, default: PropertyDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn without_scale_offset(mut self) -> Self {
        self.no_scale_offset = true;
        self
    }

    /// Name of the companion tiling property, if this slot carries one.
    pub fn tiling_name(&self) -> Option<String> {
        if self.kind == PropertyKind::Texture && !self.no_scale_offset {
            Some(format!("{}{TILING_SUFFIX}", self.name))
        } else {
            None
        }
    }

    pub fn default_vector(&self) -> Vec4 {
        match (self.default, self.kind) {
            (Some(PropertyDefault::Vector(v)), _) => Vec4::from_array(v),
            (Some(PropertyDefault::Scalar(s)), _) => Vec4::splat(s),
            (None, PropertyKind::Color) => Vec4::ONE,
            (None, _) => Vec4::ZERO,
        }
    }

    pub fn default_float(&self) -> f32 {
        match (self.default, self.kind) {
            (Some(PropertyDefault::Scalar(s)), _) => s,
            (Some(PropertyDefault::Vector(v)), _) => v[0],
            (None, PropertyKind::Range { min, .. }) => min,
            (None, _) => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shader {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ShaderProperty>,
}

impl Shader {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), properties: Vec::new() }
    }

    pub fn with_property(mut self, property: ShaderProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn property(&self, name: &str) -> Option<&ShaderProperty> {
        self.properties.iter().find(|prop| prop.name == name)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn textures(&self) -> impl Iterator<Item = &ShaderProperty> {
        self.properties.iter().filter(|prop| prop.kind == PropertyKind::Texture)
    }

    /// Every property name a material bound to this shader exposes, including
    /// the implicit `<texture>_ST` tiling slots.
    pub fn exposed_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for prop in &self.properties {
            names.insert(prop.name.clone());
            if let Some(tiling) = prop.tiling_name() {
                names.insert(tiling);
            }
        }
        names
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading shader file {}", path.display()))?;
        let shader = serde_json::from_slice::<Shader>(&bytes)
            .with_context(|| format!("Parsing shader file {}", path.display()))?;
        Ok(shader)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating shader directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing shader file {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderLibrary {
    shaders: BTreeMap<String, Arc<Shader>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a shader under its name.
    pub fn register(&mut self, shader: Shader) -> Arc<Shader> {
        let shader = Arc::new(shader);
        self.shaders.insert(shader.name.clone(), shader.clone());
        shader
    }

    pub fn get(&self, name: &str) -> Option<Arc<Shader>> {
        self.shaders.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}
