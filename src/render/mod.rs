//! GPU rendering: context, geometry, resource lifecycle, texture projection,
//! orbit camera, and the scene renderer.

pub mod camera;
pub mod context;
pub mod geometry;
pub mod renderer;
pub mod resources;
pub mod texture;

pub use camera::OrbitCamera;
pub use context::GpuContext;
pub use renderer::SceneRenderer;
pub use resources::{ResourceRegistry, TextureSlot};
