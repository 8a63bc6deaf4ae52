use core::f32::consts::PI;

use glam::{vec2, vec3, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::Noise;
#[cfg(not(target_arch = "spirv"))]
use crate::Vec3Ext;

/// Equirectangular environment map with a piecewise-constant 2D distribution
/// over its texels: a marginal CDF over rows followed by one conditional CDF
/// per row, flattened into a single array (see [`build_cdf`]).
#[derive(Clone, Copy)]
pub struct EnvMapView<'a> {
    pixels: &'a [Vec4],
    cdf: &'a [f32],
    size: UVec2,
}

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct EnvSample {
    pub direction: Vec3,
    pub radiance: Vec3,
    pub pdf: f32,
}

impl<'a> EnvMapView<'a> {
    pub fn new(pixels: &'a [Vec4], cdf: &'a [f32], size: UVec2) -> Self {
        Self { pixels, cdf, size }
    }

    pub fn is_empty(&self) -> bool {
        self.size.x == 0 || self.size.y == 0
    }

    /// Draws a direction proportionally to the map's luminance; `pdf` comes
    /// out in solid-angle measure.
    pub fn sample(&self, noise: &mut Noise) -> EnvSample {
        if self.is_empty() {
            return EnvSample {
                direction: Vec3::Z,
                radiance: Vec3::ZERO,
                pdf: 0.0,
            };
        }

        let (v, row, pdf_v) =
            sample_segment(self.cdf, 0, self.size.y, noise.sample());

        let row_cdf = (self.size.y as usize + 1)
            + row * (self.size.x as usize + 1);

        let (u, col, pdf_u) =
            sample_segment(self.cdf, row_cdf, self.size.x, noise.sample());

        let theta = v * PI;
        let sin_theta = theta.sin();

        if sin_theta <= 0.0 {
            return EnvSample {
                direction: Vec3::Y,
                radiance: Vec3::ZERO,
                pdf: 0.0,
            };
        }

        EnvSample {
            direction: direction_from_uv(vec2(u, v)),
            radiance: self.texel(col as u32, row as u32),
            pdf: pdf_u * pdf_v / (2.0 * PI * PI * sin_theta),
        }
    }

    /// Solid-angle pdf of [`Self::sample`] returning given direction; used to
    /// weight rays that reach the map through BSDF sampling instead.
    pub fn pdf(&self, direction: Vec3) -> f32 {
        if self.is_empty() {
            return 0.0;
        }

        let uv = uv_from_direction(direction);
        let sin_theta = (uv.y * PI).sin();

        if sin_theta <= 0.0 {
            return 0.0;
        }

        let col = ((uv.x * self.size.x as f32) as usize)
            .min(self.size.x as usize - 1);

        let row = ((uv.y * self.size.y as f32) as usize)
            .min(self.size.y as usize - 1);

        let pdf_v = (self.cdf[row + 1] - self.cdf[row]) * self.size.y as f32;

        let row_cdf = (self.size.y as usize + 1)
            + row * (self.size.x as usize + 1);

        let pdf_u = (self.cdf[row_cdf + col + 1] - self.cdf[row_cdf + col])
            * self.size.x as f32;

        pdf_u * pdf_v / (2.0 * PI * PI * sin_theta)
    }

    /// Radiance seen by a ray escaping into given direction.
    pub fn radiance_in(&self, direction: Vec3) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }

        let uv = uv_from_direction(direction);

        let col = ((uv.x * self.size.x as f32) as u32).min(self.size.x - 1);
        let row = ((uv.y * self.size.y as f32) as u32).min(self.size.y - 1);

        self.texel(col, row)
    }

    fn texel(&self, col: u32, row: u32) -> Vec3 {
        self.pixels[(row * self.size.x + col) as usize].xyz()
    }
}

/// Inverts one normalized CDF segment; returns the continuous coordinate in
/// `<0.0, 1.0>`, the picked cell and the cell's (discrete-measure) pdf.
fn sample_segment(
    cdf: &[f32],
    start: usize,
    count: u32,
    u: f32,
) -> (f32, usize, f32) {
    let mut lo = 0;
    let mut hi = count as usize;

    while hi - lo > 1 {
        let mid = (lo + hi) / 2;

        if cdf[start + mid] <= u {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let c0 = cdf[start + lo];
    let c1 = cdf[start + lo + 1];

    let mut du = u - c0;

    if c1 - c0 > 0.0 {
        du /= c1 - c0;
    }

    (
        (lo as f32 + du) / count as f32,
        lo,
        (c1 - c0) * count as f32,
    )
}

/// Maps `<0.0, 1.0>²` onto the unit sphere; `u` wraps longitude, `v` walks
/// latitude from the north pole down.
pub fn direction_from_uv(uv: Vec2) -> Vec3 {
    let phi = uv.x * 2.0 * PI;
    let theta = uv.y * PI;

    vec3(
        theta.sin() * phi.cos(),
        theta.cos(),
        theta.sin() * phi.sin(),
    )
}

pub fn uv_from_direction(direction: Vec3) -> Vec2 {
    let theta = direction.y.clamp(-1.0, 1.0).acos();
    let phi = direction.z.atan2(direction.x);

    let phi = if phi < 0.0 { phi + 2.0 * PI } else { phi };

    vec2(phi / (2.0 * PI), theta / PI)
}

/// Builds the flattened CDF array for [`EnvMapView`]: `height + 1` marginal
/// entries, then `width + 1` conditional entries per row; texels are weighted
/// by luminance times the row's `sin θ` so that poles don't dominate.
#[cfg(not(target_arch = "spirv"))]
pub fn build_cdf(pixels: &[Vec4], size: UVec2) -> Vec<f32> {
    let width = size.x as usize;
    let height = size.y as usize;

    let mut cdf = vec![0.0; (height + 1) + height * (width + 1)];
    let mut row_integrals = vec![0.0; height];

    for row in 0..height {
        let sin_theta = (PI * (row as f32 + 0.5) / height as f32).sin();
        let start = (height + 1) + row * (width + 1);

        let mut acc = 0.0;

        for col in 0..width {
            acc += pixels[row * width + col].xyz().luma() * sin_theta
                / width as f32;

            cdf[start + col + 1] = acc;
        }

        row_integrals[row] = acc;

        normalize_segment(&mut cdf[start..start + width + 1], acc);
    }

    let mut acc = 0.0;

    for row in 0..height {
        acc += row_integrals[row] / height as f32;
        cdf[row + 1] = acc;
    }

    normalize_segment(&mut cdf[..height + 1], acc);

    cdf
}

#[cfg(not(target_arch = "spirv"))]
fn normalize_segment(cdf: &mut [f32], integral: f32) {
    let count = cdf.len() - 1;

    if integral == 0.0 {
        // Black segments fall back to a uniform ramp so that inversion stays
        // well-defined
        for (idx, value) in cdf.iter_mut().enumerate() {
            *value = idx as f32 / count as f32;
        }
    } else {
        for value in cdf.iter_mut().skip(1) {
            *value /= integral;
        }
    }
}
