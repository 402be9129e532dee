//! avatarview - Live-driven 3D avatar head viewer
//!
//! Renders a 3D head proxy whose surface texture, material colors, and
//! orientation are driven live by:
//! - a captured photo, projected onto the head as an sRGB texture
//! - a sparse facial landmark set, converted to head yaw/pitch
//! - a user-editable customization configuration (skin/eye colors)
//!
//! The current frame can be exported as a PNG at any time after the first
//! draw. All GPU resources are explicitly tracked and released at teardown.

pub mod config;
pub mod customize;
pub mod error;
pub mod export;
pub mod pose;
pub mod render;
pub mod viewer;

pub use config::ViewerConfig;
pub use customize::Customization;
pub use error::{AvatarViewError, Result};
pub use pose::Landmark;
pub use viewer::{Viewer, ViewerHandle};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
