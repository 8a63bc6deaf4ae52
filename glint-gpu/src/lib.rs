//! Common structs, algorithms etc. used by Glint's kernels and renderer.

#![cfg_attr(target_arch = "spirv", no_std)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::too_many_arguments)]

mod adaptive;
mod brdf;
mod camera;
mod env_map;
mod hit;
mod integrator;
mod lights;
mod material;
mod noise;
mod ray;
mod settings;
mod tracer;
mod triangle;
mod utils;

pub use self::adaptive::*;
pub use self::brdf::*;
pub use self::camera::*;
pub use self::env_map::*;
pub use self::hit::*;
pub use self::integrator::*;
pub use self::lights::*;
pub use self::material::*;
pub use self::noise::*;
pub use self::ray::*;
pub use self::settings::*;
pub use self::tracer::*;
pub use self::triangle::*;
pub use self::utils::*;

pub mod prelude {
    pub use core::f32::consts::PI;

    pub use glam::*;
    #[cfg(target_arch = "spirv")]
    pub use spirv_std::num_traits::Float;

    pub use crate::*;
}

/// Size of a single kernel workgroup, in each dimension; dispatches cover the
/// viewport with `ceil(w / 8) * ceil(h / 8)` of those tiles.
pub const TILE_SIZE: u32 = 8;

/// Number of bounces forced while the camera is in motion and the renderer
/// traces just one pixel per `scaling * scaling` block.
pub const LOW_RESOLUTION_BOUNCES: u32 = 3;
