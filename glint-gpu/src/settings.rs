use bytemuck::{Pod, Zeroable};
use glam::{uvec2, UVec2, Vec4};

/// Per-frame snapshot of the render configuration; the renderer flushes it
/// right before a launch, so a kernel never observes a half-updated state.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct RenderSettings {
    pub frame_number: u32,
    pub sample_number: u32,
    pub samples_per_frame: u32,
    pub nb_bounces: u32,
    pub render_low_resolution: u32,
    pub low_resolution_scaling: u32,
    pub enable_adaptive_sampling: u32,
    pub adaptive_min_samples: u32,
    pub adaptive_threshold: f32,
    pub stop_noise_threshold: f32,
    pub freeze_random: u32,
    pub display_nans: u32,
}

impl RenderSettings {
    /// Returns whether the per-pixel sample-count and squared-luminance
    /// buffers are in use; they back both the adaptive-sampling loop and the
    /// whole-render stop condition.
    pub fn has_adaptive_buffers(&self) -> bool {
        self.enable_adaptive_sampling == 1 || self.stop_noise_threshold > 0.0
    }

    pub fn is_low_resolution(&self) -> bool {
        self.render_low_resolution == 1
    }

    pub fn freezes_random(&self) -> bool {
        self.freeze_random == 1
    }

    pub fn displays_nans(&self) -> bool {
        self.display_nans == 1
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frame_number: 0,
            sample_number: 0,
            samples_per_frame: 1,
            nb_bounces: 8,
            render_low_resolution: 0,
            low_resolution_scaling: 4,
            enable_adaptive_sampling: 0,
            adaptive_min_samples: 96,
            adaptive_threshold: 0.1,
            stop_noise_threshold: 0.0,
            freeze_random: 0,
            display_nans: 0,
        }
    }
}

pub const AMBIENT_UNIFORM: u32 = 0;
pub const AMBIENT_ENVMAP: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct WorldSettings {
    /// Radiance returned for missed rays when `ambient_mode` is
    /// [`AMBIENT_UNIFORM`].
    pub ambient_color: Vec4,
    pub ambient_mode: u32,
    pub envmap_width: u32,
    pub envmap_height: u32,
    /// When zero, the visible background keeps the environment map's raw
    /// radiance while lighting still uses `envmap_intensity`.
    pub envmap_scale_background: u32,
    pub envmap_intensity: f32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl WorldSettings {
    pub fn uses_envmap(&self) -> bool {
        self.ambient_mode == AMBIENT_ENVMAP
    }

    pub fn scales_background(&self) -> bool {
        self.envmap_scale_background == 1
    }

    pub fn envmap_extent(&self) -> UVec2 {
        uvec2(self.envmap_width, self.envmap_height)
    }
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            ambient_color: Vec4::splat(0.5),
            ambient_mode: AMBIENT_UNIFORM,
            envmap_width: 0,
            envmap_height: 0,
            envmap_scale_background: 1,
            envmap_intensity: 1.0,
            _pad0: 0,
            _pad1: 0,
            _pad2: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_buffers_follow_either_threshold() {
        let mut settings = RenderSettings::default();

        assert!(!settings.has_adaptive_buffers());

        settings.enable_adaptive_sampling = 1;
        assert!(settings.has_adaptive_buffers());

        settings.enable_adaptive_sampling = 0;
        settings.stop_noise_threshold = 0.05;
        assert!(settings.has_adaptive_buffers());
    }
}
