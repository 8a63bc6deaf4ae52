use glam::Vec3;
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{F32Ext, RenderSettings, Vec3Ext};

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct SamplingDecision {
    /// Whether this pixel should trace more samples this frame.
    pub keep_sampling: bool,
    /// Whether this pixel counts towards the frame's converged-pixel tally.
    pub converged: bool,
}

impl SamplingDecision {
    pub fn keep_sampling() -> Self {
        Self {
            keep_sampling: true,
            converged: false,
        }
    }
}

/// Decides whether a pixel's luminance estimate has settled, by checking that
/// the 95% confidence interval of the mean shrank below a fraction of the
/// mean itself.
///
/// With adaptive sampling enabled a converged pixel stops tracing; with only
/// the whole-render stop threshold active it keeps tracing and merely reports
/// itself, letting the host decide when enough of the viewport settled.
pub fn sampling_decision(
    render: &RenderSettings,
    color_sum: Vec3,
    sample_count: u32,
    squared_luminance: f32,
) -> SamplingDecision {
    if !render.has_adaptive_buffers() {
        return SamplingDecision::keep_sampling();
    }

    // Variance needs at least two samples; the warm-up also keeps early lucky
    // streaks from freezing a pixel at the wrong brightness
    if sample_count < render.adaptive_min_samples.max(2) {
        return SamplingDecision::keep_sampling();
    }

    let count = sample_count as f32;
    let mean = color_sum.luma() / count;

    let variance =
        ((squared_luminance - count * mean.sqr()) / (count - 1.0)).max(0.0);

    let interval = 1.96 * (variance / count).sqrt();

    let threshold = if render.enable_adaptive_sampling == 1 {
        render.adaptive_threshold
    } else {
        render.stop_noise_threshold
    };

    let converged = interval <= threshold * mean;

    SamplingDecision {
        keep_sampling: !(render.enable_adaptive_sampling == 1 && converged),
        converged,
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    fn settings() -> RenderSettings {
        RenderSettings {
            enable_adaptive_sampling: 1,
            adaptive_min_samples: 8,
            adaptive_threshold: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn disabled_always_keeps_sampling() {
        let render = RenderSettings::default();

        let decision =
            sampling_decision(&render, vec3(100.0, 0.0, 0.0), 1000, 1.0e6);

        assert_eq!(decision, SamplingDecision::keep_sampling());
    }

    #[test]
    fn warm_up_keeps_sampling() {
        let decision =
            sampling_decision(&settings(), Vec3::splat(3.5), 7, 3.5);

        assert_eq!(decision, SamplingDecision::keep_sampling());
    }

    #[test]
    fn zero_variance_converges() {
        // 16 identical samples of luminance 0.5
        let sum = Vec3::splat(0.5) * 16.0;
        let squared = 16.0 * 0.5 * 0.5;

        let decision = sampling_decision(&settings(), sum, 16, squared);

        assert!(decision.converged);
        assert!(!decision.keep_sampling);
    }

    #[test]
    fn noisy_pixel_keeps_sampling() {
        // Half the samples at luminance 0, half at 1
        let sum = Vec3::splat(8.0);
        let squared = 8.0;

        let decision = sampling_decision(&settings(), sum, 16, squared);

        assert!(!decision.converged);
        assert!(decision.keep_sampling);
    }

    #[test]
    fn stop_threshold_reports_but_keeps_sampling() {
        let render = RenderSettings {
            enable_adaptive_sampling: 0,
            stop_noise_threshold: 0.1,
            adaptive_min_samples: 8,
            ..Default::default()
        };

        let sum = Vec3::splat(0.5) * 16.0;
        let squared = 16.0 * 0.5 * 0.5;

        let decision = sampling_decision(&render, sum, 16, squared);

        assert!(decision.converged);
        assert!(decision.keep_sampling);
    }
}
