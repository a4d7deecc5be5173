//! Value synthesis: the random primitives a compiled plan is realised with.

use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SchemaError;
use crate::format::TextFormat;

use super::clock::Clock;
use super::text;

/// Most decimals a generated float keeps.
const MAX_FLOAT_DECIMALS: usize = 10;

/// Significant digits an f64 can carry.
const MAX_SIGNIFICANT_DIGITS: usize = 17;

/// Produces concrete values for generation directives.
///
/// Implementations must honour the bounds they are given; callers guarantee
/// `min <= max`.
pub trait Synthesizer {
    fn integer(&mut self, min: i64, max: i64) -> i64;
    fn float(&mut self, min: f64, max: f64) -> f64;
    /// `true` with probability `ratio`.
    fn boolean(&mut self, ratio: f64) -> bool;
    fn length(&mut self, min: usize, max: usize) -> usize;
    fn text(&mut self, format: &TextFormat, clock: &dyn Clock) -> Result<String, SchemaError>;
}

/// Default synthesizer: a seedable RNG for numbers, proptest's regex
/// strategies for pattern text.
pub struct RandomSynthesizer {
    rng: StdRng,
    runner: TestRunner,
}

impl RandomSynthesizer {
    /// Reproducible output for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    fn from_rng(mut rng: StdRng) -> Self {
        let mut seed = [0u8; 32];
        rng.fill(&mut seed);
        let runner = TestRunner::new_with_rng(Config::default(), TestRng::from_seed(RngAlgorithm::ChaCha, &seed));
        Self { rng, runner }
    }
}

impl Default for RandomSynthesizer {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Synthesizer for RandomSynthesizer {
    fn integer(&mut self, min: i64, max: i64) -> i64 {
        self.rng.gen_range(min..=max)
    }

    fn float(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        // interpolate so `max - min` never overflows to infinity
        let t: f64 = self.rng.gen_range(0.0..=1.0);
        let raw = (min * (1.0 - t) + max * t).clamp(min, max);
        let int_digits = (raw.abs().trunc().log10().floor().max(0.0) as usize) + 1;
        let cap = MAX_SIGNIFICANT_DIGITS.saturating_sub(int_digits).min(MAX_FLOAT_DECIMALS);
        let decimals = self.rng.gen_range(0..=cap);
        let rounded: f64 = format!("{raw:.decimals$}").parse().unwrap_or(raw);
        rounded.clamp(min, max)
    }

    fn boolean(&mut self, ratio: f64) -> bool {
        self.rng.gen_bool(ratio.clamp(0.0, 1.0))
    }

    fn length(&mut self, min: usize, max: usize) -> usize {
        self.rng.gen_range(min..=max)
    }

    fn text(&mut self, format: &TextFormat, clock: &dyn Clock) -> Result<String, SchemaError> {
        match format {
            TextFormat::Any => Ok(text::any(&mut self.rng)),
            TextFormat::Named(name) => text::named(name, &mut self.rng, &mut self.runner, clock),
            TextFormat::Pattern(pattern) => text::from_pattern(pattern, &mut self.runner),
            TextFormat::Unknown(name) => Err(SchemaError::UnknownFormat {
                format: name.clone(),
                path: "$".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_synthesizers_repeat() {
        let mut a = RandomSynthesizer::seeded(42);
        let mut b = RandomSynthesizer::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.integer(-100, 100), b.integer(-100, 100));
            assert_eq!(a.float(0.0, 1.0), b.float(0.0, 1.0));
        }
    }

    #[test]
    fn floats_stay_in_range() {
        let mut s = RandomSynthesizer::seeded(3);
        for _ in 0..500 {
            let v = s.float(5.1524521411, 5.1524521416);
            assert!((5.1524521411..=5.1524521416).contains(&v), "{v}");
            let w = s.float(-1.5, 2.25);
            assert!((-1.5..=2.25).contains(&w));
        }
        assert_eq!(s.float(3.0, 3.0), 3.0);
    }

    #[test]
    fn floats_span_the_full_double_range() {
        let mut s = RandomSynthesizer::seeded(9);
        for _ in 0..200 {
            let v = s.float(-1.7e308, 1.7e308);
            assert!(v.is_finite() && (-1.7e308..=1.7e308).contains(&v), "{v}");
            let w = s.float(f64::MIN, f64::MAX);
            assert!(w.is_finite(), "{w}");
        }
    }

    #[test]
    fn boolean_ratio_extremes() {
        let mut s = RandomSynthesizer::seeded(5);
        assert!((0..50).all(|_| s.boolean(1.0)));
        assert!((0..50).all(|_| !s.boolean(0.0)));
    }
}
