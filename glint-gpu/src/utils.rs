use glam::{vec3, Vec3};

pub trait F32Ext
where
    Self: Sized,
{
    fn sqr(self) -> Self;
    fn saturate(self) -> Self;
}

impl F32Ext for f32 {
    fn sqr(self) -> Self {
        self * self
    }

    fn saturate(self) -> Self {
        self.clamp(0.0, 1.0)
    }
}

pub trait Vec3Ext
where
    Self: Sized,
{
    /// Returns luminance of this color-vector.
    fn luma(self) -> f32;

    /// Returns whether this color-vector carries a NaN or a negative
    /// component; such samples must not reach the accumulation buffers.
    fn is_invalid(self) -> bool;
}

impl Vec3Ext for Vec3 {
    fn luma(self) -> f32 {
        self.dot(vec3(0.2126, 0.7152, 0.0722))
    }

    fn is_invalid(self) -> bool {
        // `x != x` doubles as a NaN check; `is_nan()` lowers poorly on some
        // SPIR-V drivers
        (self.x < 0.0)
            | (self.y < 0.0)
            | (self.z < 0.0)
            | (self.x != self.x)
            | (self.y != self.y)
            | (self.z != self.z)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn luma() {
        assert_relative_eq!(Vec3::ONE.luma(), 1.0);
        assert_relative_eq!(Vec3::ZERO.luma(), 0.0);
        assert!(vec3(0.0, 1.0, 0.0).luma() > vec3(0.0, 0.0, 1.0).luma());
    }

    #[test]
    fn is_invalid() {
        assert!(!Vec3::ZERO.is_invalid());
        assert!(!vec3(0.1, 0.2, 0.3).is_invalid());
        assert!(vec3(-0.1, 0.2, 0.3).is_invalid());
        assert!(vec3(0.1, f32::NAN, 0.3).is_invalid());
    }
}
