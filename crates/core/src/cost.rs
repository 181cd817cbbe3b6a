//! Deterministic cost model for generation jobs.
//!
//! Cost is computed from the job parameters alone, before any remote
//! call is made, so the ledger debit and any compensating refund always
//! agree on the amount.

use crate::resource::is_sdxl_family;

/// Cost of one image at the baseline resolution and step count.
pub const BASE_COST_PER_IMAGE: f64 = 10.0;

/// Baseline pixel count (512 x 512).
pub const BASE_PIXELS: f64 = 512.0 * 512.0;

/// Baseline sampling steps.
pub const BASE_STEPS: f64 = 20.0;

/// Cost multiplier for SDXL-family checkpoints.
pub const SDXL_COST_MULTIPLIER: f64 = 1.5;

/// Compute the total cost of a generation job in ledger units.
///
/// Scales linearly with pixel count and step count relative to the
/// baseline, rounded up per image, then multiplied by quantity. A
/// quantity of zero costs zero (and zero-cost jobs never touch the
/// ledger).
pub fn generation_cost(
    width: u32,
    height: u32,
    steps: u32,
    quantity: u32,
    base_model: &str,
) -> u64 {
    let pixels = f64::from(width) * f64::from(height);
    let family_multiplier = if is_sdxl_family(base_model) {
        SDXL_COST_MULTIPLIER
    } else {
        1.0
    };
    let per_image = BASE_COST_PER_IMAGE
        * (pixels / BASE_PIXELS)
        * (f64::from(steps) / BASE_STEPS)
        * family_multiplier;
    (per_image.ceil() as u64) * u64::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_image_costs_base_rate() {
        assert_eq!(generation_cost(512, 512, 20, 1, "SD1"), 10);
    }

    #[test]
    fn four_baseline_images_cost_forty() {
        assert_eq!(generation_cost(512, 512, 20, 4, "SD1"), 40);
    }

    #[test]
    fn cost_scales_with_resolution() {
        // 512x768 is 1.5x the baseline pixel count.
        assert_eq!(generation_cost(512, 768, 20, 1, "SD1"), 15);
    }

    #[test]
    fn cost_scales_with_steps() {
        assert_eq!(generation_cost(512, 512, 40, 1, "SD1"), 20);
    }

    #[test]
    fn sdxl_carries_family_multiplier() {
        assert_eq!(generation_cost(512, 512, 20, 1, "SDXL"), 15);
    }

    #[test]
    fn fractional_per_image_cost_rounds_up() {
        // 25 steps -> 12.5 per image -> 13.
        assert_eq!(generation_cost(512, 512, 25, 2, "SD1"), 26);
    }

    #[test]
    fn zero_quantity_costs_zero() {
        assert_eq!(generation_cost(512, 512, 20, 0, "SD1"), 0);
    }
}
