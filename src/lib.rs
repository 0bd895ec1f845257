pub mod assets;
pub mod backup;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod ecs;
pub mod filter;
pub mod foldout;
pub mod index;
pub mod manager;
pub mod material;
pub mod scene;
pub mod shader;
pub mod snapshot;

pub use assets::{AssetDatabase, AssetRepository};
pub use ecs::EcsScene;
pub use manager::MaterialManager;
pub use material::{Material, MaterialId};
pub use scene::{EntityKey, SceneGraph};
pub use shader::{Shader, ShaderProperty};
