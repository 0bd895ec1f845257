use crate::shader::Shader;
use anyhow::{Context, Result};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// Stable lookup key for a material: its project-relative asset path with `/`
/// separators, or a synthetic key for materials that were never saved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(String);

impl MaterialId {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_asset_path(path: &Path) -> Self {
        let key = path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MaterialId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2Data {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorData {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

fn unit_scale() -> Vec2Data {
    Vec2Data { x: 1.0, y: 1.0 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TexEnvData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default = "unit_scale")]
    pub scale: Vec2Data,
    #[serde(default)]
    pub offset: Vec2Data,
}

impl Default for TexEnvData {
    fn default() -> Self {
        Self { texture: None, scale: unit_scale(), offset: Vec2Data::default() }
    }
}

/// Serialized property storage. Entries survive shader swaps, so this can hold
/// names the current shader no longer declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedProperties {
    #[serde(default)]
    pub tex_envs: BTreeMap<String, TexEnvData>,
    #[serde(default)]
    pub floats: BTreeMap<String, f32>,
    #[serde(default)]
    pub colors: BTreeMap<String, ColorData>,
}

impl SavedProperties {
    pub fn is_empty(&self) -> bool {
        self.tex_envs.is_empty() && self.floats.is_empty() && self.colors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tex_envs.len() + self.floats.len() + self.colors.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tex_envs.contains_key(name) || self.floats.contains_key(name) || self.colors.contains_key(name)
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.tex_envs
            .keys()
            .chain(self.floats.keys())
            .chain(self.colors.keys())
            .map(|k| k.as_str())
            .collect()
    }

    pub fn clear(&mut self) {
        self.tex_envs.clear();
        self.floats.clear();
        self.colors.clear();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    shader: String,
    #[serde(default)]
    saved: SavedProperties,
    #[serde(skip)]
    exposed: BTreeMap<String, CachedDefault>,
}

/// Defaults resolved from the shader schema at assignment time.
#[derive(Debug, Clone, Copy)]
struct CachedDefault {
    vector: Vec4,
    float: f32,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: &Shader) -> Self {
        let mut material = Self {
            name: name.into(),
            shader: shader.name.clone(),
            saved: SavedProperties::default(),
            exposed: BTreeMap::new(),
        };
        material.set_shader(shader);
        material
    }

    pub fn shader_name(&self) -> &str {
        &self.shader
    }

    /// Assigns `shader` and rebuilds the exposed-property cache from its schema.
    /// Saved storage is left as-is, stale entries included.
    pub fn set_shader(&mut self, shader: &Shader) {
        self.shader = shader.name.clone();
        self.exposed.clear();
        for prop in &shader.properties {
            let default = CachedDefault { vector: prop.default_vector(), float: prop.default_float() };
            self.exposed.insert(prop.name.clone(), default);
            if let Some(tiling) = prop.tiling_name() {
                self.exposed.insert(tiling, CachedDefault { vector: Vec4::new(1.0, 1.0, 0.0, 0.0), float: 0.0 });
            }
        }
    }

    /// Drops the exposed-property cache without touching the shader name. Used
    /// when the assigned shader cannot be found.
    pub(crate) fn unbind_shader(&mut self) {
        self.exposed.clear();
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.exposed.contains_key(name)
    }

    pub fn saved(&self) -> &SavedProperties {
        &self.saved
    }

    /// Saved entries the current shader does not expose.
    pub fn stale_properties(&self) -> Vec<String> {
        self.saved.names().into_iter().filter(|name| !self.has_property(name)).map(str::to_string).collect()
    }

    pub fn clear_saved_properties(&mut self) {
        self.saved.clear();
    }

    pub fn color(&self, name: &str) -> Vec4 {
        match self.saved.colors.get(name) {
            Some(color) => Vec4::from(*color),
            None => self.exposed.get(name).map(|d| d.vector).unwrap_or(Vec4::ZERO),
        }
    }

    pub fn vector(&self, name: &str) -> Vec4 {
        self.color(name)
    }

    pub fn float(&self, name: &str) -> f32 {
        match self.saved.floats.get(name) {
            Some(value) => *value,
            None => self.exposed.get(name).map(|d| d.float).unwrap_or(0.0),
        }
    }

    pub fn texture(&self, name: &str) -> Option<&str> {
        self.saved.tex_envs.get(name).and_then(|env| env.texture.as_deref())
    }

    pub fn texture_scale(&self, name: &str) -> Vec2 {
        self.saved.tex_envs.get(name).map(|env| Vec2::from(env.scale)).unwrap_or(Vec2::ONE)
    }

    pub fn texture_offset(&self, name: &str) -> Vec2 {
        self.saved.tex_envs.get(name).map(|env| Vec2::from(env.offset)).unwrap_or(Vec2::ZERO)
    }

    pub fn set_color(&mut self, name: &str, value: Vec4) {
        self.saved.colors.insert(name.to_string(), value.into());
    }

    pub fn set_vector(&mut self, name: &str, value: Vec4) {
        self.set_color(name, value);
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.saved.floats.insert(name.to_string(), value);
    }

    pub fn set_texture(&mut self, name: &str, texture: Option<String>) {
        self.saved.tex_envs.entry(name.to_string()).or_default().texture = texture;
    }

    pub fn set_texture_scale(&mut self, name: &str, scale: Vec2) {
        self.saved.tex_envs.entry(name.to_string()).or_default().scale = scale.into();
    }

    pub fn set_texture_offset(&mut self, name: &str, offset: Vec2) {
        self.saved.tex_envs.entry(name.to_string()).or_default().offset = offset.into();
    }

    /// Texture slots with a bound texture, in declaration order, keeping only the
    /// first slot for a texture that is bound more than once.
    pub fn used_textures(&self, shader: &Shader) -> Vec<String> {
        let mut seen = HashSet::new();
        shader
            .textures()
            .filter_map(|prop| {
                let texture = self.texture(&prop.name)?;
                seen.insert(texture).then(|| prop.name.clone())
            })
            .collect()
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading material file {}", path.display()))?;
        let material = serde_json::from_slice::<Material>(&bytes)
            .with_context(|| format!("Parsing material file {}", path.display()))?;
        Ok(material)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating material directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes())
            .with_context(|| format!("Writing material file {}", path.display()))?;
        Ok(())
    }
}

impl From<Vec2> for Vec2Data {
    fn from(value: Vec2) -> Self {
        Self { x: value.x, y: value.y }
    }
}

impl From<Vec2Data> for Vec2 {
    fn from(value: Vec2Data) -> Self {
        Vec2::new(value.x, value.y)
    }
}

impl From<Vec4> for ColorData {
    fn from(value: Vec4) -> Self {
        Self { r: value.x, g: value.y, b: value.z, a: value.w }
    }
}

impl From<ColorData> for Vec4 {
    fn from(value: ColorData) -> Self {
        Vec4::new(value.r, value.g, value.b, value.a)
    }
}
