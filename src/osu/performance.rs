//! Pluggable pp formulas.
//!
//! Servers run different versions of the performance formula (and relax
//! rankings usually run their own), so every play remembers the tag of the
//! formula it was scored with, and formulas are looked up by that tag.

use std::collections::HashMap;
use std::sync::Arc;

use super::beatmap::BeatmapMeta;
use super::mode::{Mode, Variant};
use super::mods::Mods;
use super::play::Play;

// {{{ Formula trait
pub trait PerformanceFormula: Send + Sync {
	/// Computes the pp value of a play. With `as_full_combo` set, the play is
	/// evaluated as if it had no combo breaks.
	///
	/// Returns [None] when the formula cannot evaluate this play.
	fn calculate(&self, play: &Play, beatmap: &BeatmapMeta, as_full_combo: bool) -> Option<f64>;

	/// Computes the pp value of a hypothetical perfect play.
	fn simulate(&self, beatmap: &BeatmapMeta, mode: Mode, mods: Mods) -> Option<f64>;
}
// }}}
// {{{ Registry
#[derive(Clone, Default)]
pub struct FormulaRegistry {
	formulas: HashMap<String, Arc<dyn PerformanceFormula>>,
}

impl FormulaRegistry {
	/// A registry containing every formula shipped with the bot.
	pub fn with_builtins() -> Self {
		let mut registry = Self::default();
		for variant in Variant::VARIANTS {
			registry.register(
				ComboScalingEstimate::version(variant),
				ComboScalingEstimate::new(variant),
			);
		}

		registry
	}

	#[inline]
	pub fn register(&mut self, version: &str, formula: impl PerformanceFormula + 'static) {
		self.formulas.insert(version.to_string(), Arc::new(formula));
	}

	#[inline]
	pub fn by_version(&self, version: &str) -> Option<&dyn PerformanceFormula> {
		self.formulas.get(version).map(|f| &**f)
	}
}
// }}}
// {{{ Combo scaling estimate
/// Estimates full combo pp by dividing out the combo scaling and miss
/// penalty factors the standard formula applies to a play.
///
/// Star rating and accuracy are untouched, so this only undoes the part of
/// the loss caused by breaking combo.
///
/// Perfect plays are estimated from the star rating alone, assuming aim and
/// speed contribute equally to it. Accuracy pp needs the overall difficulty
/// of the map, which isn't known, so it is left out.
pub struct ComboScalingEstimate {
	variant: Variant,
}

impl ComboScalingEstimate {
	pub const VERSION: &'static str = "ppv2";
	pub const RELAX_VERSION: &'static str = "relax";
	pub const AUTOPILOT_VERSION: &'static str = "autopilot";

	const COMBO_EXPONENT: f64 = 0.8;
	const MISS_PENALTY: f64 = 0.97;
	const GLOBAL_MULTIPLIER: f64 = 1.12;
	const SUM_EXPONENT: f64 = 1.1;

	#[inline]
	pub const fn new(variant: Variant) -> Self {
		Self { variant }
	}

	/// The tag the estimate is registered under for a variant.
	#[inline]
	pub const fn version(variant: Variant) -> &'static str {
		match variant {
			Variant::Vanilla => Self::VERSION,
			Variant::Relax => Self::RELAX_VERSION,
			Variant::Autopilot => Self::AUTOPILOT_VERSION,
		}
	}

	fn choke_multiplier(play: &Play, beatmap: &BeatmapMeta) -> Option<f64> {
		if play.max_combo == 0 || beatmap.max_combo == 0 {
			return None;
		}

		let combo_scaling = (play.max_combo as f64 / beatmap.max_combo as f64)
			.powf(Self::COMBO_EXPONENT)
			.min(1.0);
		let miss_penalty = Self::MISS_PENALTY.powi(play.judgements.count_miss as i32);

		Some(combo_scaling * miss_penalty)
	}

	/// The value of one skill, before the global multiplier.
	fn skill_value(stars: f64, object_count: u32) -> f64 {
		let base = (5.0 * (stars / 0.0675).max(1.0) - 4.0).powi(3) / 100_000.0;

		let objects = object_count as f64;
		let mut length_bonus = 0.95 + 0.4 * (objects / 2000.0).min(1.0);
		if objects > 2000.0 {
			length_bonus += (objects / 2000.0).log10() * 0.5;
		}

		base * length_bonus
	}
}

impl PerformanceFormula for ComboScalingEstimate {
	fn calculate(&self, play: &Play, beatmap: &BeatmapMeta, as_full_combo: bool) -> Option<f64> {
		if !as_full_combo || play.full_combo {
			return Some(play.pp);
		}

		if play.mode != Mode::Standard {
			return None;
		}

		let multiplier = Self::choke_multiplier(play, beatmap)?;
		Some(play.pp / multiplier)
	}

	fn simulate(&self, beatmap: &BeatmapMeta, mode: Mode, mods: Mods) -> Option<f64> {
		if mode != Mode::Standard || beatmap.star_rating <= 0.0 || beatmap.max_combo == 0 {
			return None;
		}

		// The combo of a map is about as large as its object count
		let skill = Self::skill_value(beatmap.star_rating / 2.0, beatmap.max_combo);
		let total = match self.variant {
			Variant::Vanilla => {
				(2.0 * skill.powf(Self::SUM_EXPONENT)).powf(1.0 / Self::SUM_EXPONENT)
			}
			// Only one of the two skills is up to the player
			Variant::Relax | Variant::Autopilot => skill,
		};

		let mut multiplier = Self::GLOBAL_MULTIPLIER;
		if mods.contains(Mods::NO_FAIL) {
			multiplier *= 0.9;
		}
		if mods.contains(Mods::SPUN_OUT) {
			multiplier *= 0.95;
		}

		Some(total * multiplier)
	}
}
// }}}
// {{{ Tests
#[cfg(test)]
mod performance_tests {
	use super::*;
	use crate::context::config::FormulaTags;
	use crate::osu::play::play_tests::{beatmap, choked_play};

	#[test]
	fn unknown_versions_are_unavailable() {
		let registry = FormulaRegistry::with_builtins();
		assert!(registry.by_version("ppv2").is_some());
		assert!(registry.by_version("akatsuki-rx-v3").is_none());
	}

	#[test]
	fn every_variant_has_a_formula() {
		let registry = FormulaRegistry::with_builtins();
		let tags = FormulaTags::default();
		for variant in Variant::VARIANTS {
			assert!(registry.by_version(tags.for_variant(variant)).is_some());
		}
	}

	#[test]
	fn estimate_never_lowers_pp() {
		let formula = ComboScalingEstimate::new(Variant::Vanilla);
		let map = beatmap(1, 1400);
		let play = choked_play(1, 250.0);

		let fc = formula.calculate(&play, &map, true).unwrap();
		let expected = 250.0 / ((600.0f64 / 1400.0).powf(0.8) * 0.97f64.powi(8));
		assert!((fc - expected).abs() < 1e-9);
		assert!(fc > play.pp);

		assert_eq!(formula.calculate(&play, &map, false), Some(250.0));
	}

	#[test]
	fn estimate_refuses_other_modes() {
		let mut play = choked_play(1, 250.0);
		play.mode = Mode::Mania;
		let formula = ComboScalingEstimate::new(Variant::Vanilla);
		assert_eq!(formula.calculate(&play, &beatmap(1, 1400), true), None);
		assert_eq!(formula.simulate(&beatmap(1, 1400), Mode::Mania, Mods::NONE), None);
	}

	#[test]
	fn perfect_plays_follow_the_star_rating() {
		let map = beatmap(1, 1400);
		let vanilla = ComboScalingEstimate::new(Variant::Vanilla);
		let relax = ComboScalingEstimate::new(Variant::Relax);

		let skill = (5.0 * (2.75f64 / 0.0675) - 4.0).powi(3) / 100_000.0 * (0.95 + 0.4 * 0.7);
		let relax_pp = relax.simulate(&map, Mode::Standard, Mods::NONE).unwrap();
		assert!((relax_pp - skill * 1.12).abs() < 1e-9);

		let vanilla_pp = vanilla.simulate(&map, Mode::Standard, Mods::HIDDEN).unwrap();
		assert!(vanilla_pp > relax_pp);

		let no_fail = vanilla.simulate(&map, Mode::Standard, Mods::NO_FAIL).unwrap();
		assert!((no_fail - vanilla_pp * 0.9).abs() < 1e-9);

		let harder = BeatmapMeta {
			star_rating: 7.0,
			..map
		};
		assert!(vanilla.simulate(&harder, Mode::Standard, Mods::NONE).unwrap() > vanilla_pp);
	}
}
// }}}
