//! Contest reward scaling
//!
//! The multiplier depends on the level difference `d = defender - challenger`:
//! fighting down shrinks the reward by 10% per level (never below 0.05),
//! fighting up grows it by 10% per level (never above 3.0).

use crate::rng::RandomSource;

pub const MIN_MULTIPLIER: f64 = 0.05;
pub const MAX_MULTIPLIER: f64 = 3.0;
pub const STEP_PER_LEVEL: f64 = 0.10;

/// Level-difference multiplier, always within [MIN_MULTIPLIER, MAX_MULTIPLIER]
pub fn reward_multiplier(challenger_level: u32, defender_level: u32) -> f64 {
    let d = defender_level as i64 - challenger_level as i64;
    let multiplier = match d {
        d if d < 0 => (1.0 - d.unsigned_abs() as f64 * STEP_PER_LEVEL).max(MIN_MULTIPLIER),
        d if d > 0 => (1.0 + d as f64 * STEP_PER_LEVEL).min(MAX_MULTIPLIER),
        _ => 1.0,
    };
    multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
}

/// Base reward scaled by `multiplier` and a uniform ±`jitter`, floored
pub fn compute_reward(base: u64, multiplier: f64, jitter: f64, rng: &mut dyn RandomSource) -> u64 {
    let roll = rng.next_f64() * 2.0 - 1.0;
    let factor = 1.0 + jitter * roll;
    let reward = base as f64 * multiplier * factor;
    if reward.is_finite() && reward > 0.0 {
        reward.floor() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRandom;

    #[test]
    fn test_equal_levels() {
        assert_eq!(reward_multiplier(20, 20), 1.0);
    }

    #[test]
    fn test_fighting_down_shrinks_reward() {
        assert!((reward_multiplier(23, 20) - 0.7).abs() < 1e-9);
        assert_eq!(reward_multiplier(200, 1), MIN_MULTIPLIER);
    }

    #[test]
    fn test_fighting_up_grows_reward() {
        assert!((reward_multiplier(10, 15) - 1.5).abs() < 1e-9);
        assert_eq!(reward_multiplier(1, 200), MAX_MULTIPLIER);
    }

    #[test]
    fn test_multiplier_always_clamped() {
        for a in [1, 5, 50, 500, u32::MAX] {
            for b in [1, 5, 50, 500, u32::MAX] {
                let m = reward_multiplier(a, b);
                assert!((MIN_MULTIPLIER..=MAX_MULTIPLIER).contains(&m), "{} vs {} gave {}", a, b, m);
            }
        }
    }

    #[test]
    fn test_jitter_bounds() {
        let mut low = ScriptedRandom::constant(0.0);
        let mut mid = ScriptedRandom::constant(0.5);
        let mut high = ScriptedRandom::constant(0.999_999);

        assert_eq!(compute_reward(100, 1.0, 0.1, &mut low), 90);
        assert_eq!(compute_reward(100, 1.0, 0.1, &mut mid), 100);
        assert_eq!(compute_reward(100, 1.0, 0.1, &mut high), 109);
    }
}
