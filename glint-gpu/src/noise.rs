/// Seed-scrambler used to derive per-pixel random streams; pixels get
/// `wang_hash(pixel_index + 1)` so that pixel zero doesn't degenerate, and
/// each frame re-scrambles with the sample number unless the random state is
/// frozen for debugging.
pub fn wang_hash(mut seed: u32) -> u32 {
    seed = (seed ^ 61) ^ (seed >> 16);
    seed = seed.wrapping_mul(9);
    seed ^= seed >> 4;
    seed = seed.wrapping_mul(0x27d4eb2d);
    seed ^ (seed >> 15)
}

#[derive(Copy, Clone)]
pub struct Noise {
    state: u32,
}

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generates a uniform sample in range `<0.0, 1.0>`.
    pub fn sample(&mut self) -> f32 {
        (self.sample_int() as f32) / (u32::MAX as f32)
    }

    /// Generates a uniform sample in range `<0, u32::MAX>`.
    pub fn sample_int(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(747796405).wrapping_add(2891336453);

        let word = ((self.state >> ((self.state >> 28) + 4)) ^ self.state)
            .wrapping_mul(277803737);

        (word >> 22) ^ word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let mut a = Noise::new(wang_hash(123));
        let mut b = Noise::new(wang_hash(123));

        for _ in 0..64 {
            assert_eq!(a.sample_int(), b.sample_int());
        }
    }

    #[test]
    fn stays_in_unit_range() {
        let mut noise = Noise::new(wang_hash(1));

        for _ in 0..1024 {
            let sample = noise.sample();

            assert!(sample >= 0.0 && sample <= 1.0);
        }
    }

    #[test]
    fn scrambles_consecutive_seeds() {
        // Neighboring pixels must not see correlated streams
        let mut a = Noise::new(wang_hash(1));
        let mut b = Noise::new(wang_hash(2));

        assert_ne!(a.sample_int(), b.sample_int());
    }
}
