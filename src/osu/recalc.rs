//! Recomputation of a player's total pp under hypothetical changes to
//! their best plays.
//!
//! A total is made of the weighted sum of the top plays plus a "bonus"
//! the server awards for the amount of ranked plays. The bonus can't be
//! computed from the best plays alone, so it's recovered by subtracting
//! the weighted sum from the total the server reports.

// {{{ Imports
use anyhow::anyhow;
use tracing::{debug, warn};

use crate::context::{ErrorKind, TagError, TaggedError};

use super::beatmap::BeatmapStore;
use super::performance::FormulaRegistry;
use super::play::Play;
// }}}

// {{{ Constants
/// Each play is worth this much less than the one ranked above it.
pub const WEIGHT_DECAY: f64 = 0.95;

/// Plays ranked below this contribute nothing.
pub const WEIGHTED_PLAY_LIMIT: usize = 100;

/// The bonus a player with a very large amount of ranked plays approaches.
pub const BONUS_PP_CEILING: f64 = 416.32;
// }}}
// {{{ Weighting
/// Stable sort, best first. Equal values keep their relative order.
#[inline]
pub fn sort_descending(values: &mut [f64]) {
	values.sort_by(|a, b| b.total_cmp(a));
}

/// Weighted sum of a list of pp values sorted in descending order.
pub fn weighted_total(sorted: &[f64]) -> f64 {
	sorted
		.iter()
		.take(WEIGHTED_PLAY_LIMIT)
		.enumerate()
		.map(|(i, pp)| pp * WEIGHT_DECAY.powi(i as i32))
		.sum()
}

#[inline]
fn sorted_copy(values: &[f64]) -> Vec<f64> {
	let mut values = values.to_vec();
	sort_descending(&mut values);
	values
}
// }}}
// {{{ Bonus pp
/// The part of a total not explained by the weighted best plays.
///
/// This is negative whenever the server reports a total smaller than the
/// weighted sum of its own best plays. Such values are kept as they are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonusPp(pub f64);

impl BonusPp {
	pub fn extract(authoritative_total: f64, best_values: &[f64]) -> Self {
		let bonus = Self(authoritative_total - weighted_total(&sorted_copy(best_values)));

		if bonus.is_inconsistent() {
			warn!(
				authoritative_total,
				bonus = bonus.0,
				"Total pp is smaller than the weighted sum of the best plays"
			);
		}

		bonus
	}

	#[inline]
	pub fn is_inconsistent(self) -> bool {
		self.0 < 0.0
	}

	/// How close the bonus is to [BONUS_PP_CEILING], in percent.
	#[inline]
	pub fn percentage_filled(self) -> f64 {
		self.0.min(BONUS_PP_CEILING) / BONUS_PP_CEILING * 100.0
	}
}
// }}}
// {{{ Outcome
/// A play whose choke has been removed.
#[derive(Debug, Clone)]
pub struct UnchokedPlay {
	/// Index of the play in the original best-play list.
	pub index: usize,
	pub previous_pp: f64,
	pub play: Play,
}

impl UnchokedPlay {
	#[inline]
	pub fn gain(&self) -> f64 {
		self.play.pp - self.previous_pp
	}
}

#[derive(Debug, Clone)]
pub struct Recalculation {
	pub previous_total: f64,
	pub new_total: f64,
	pub bonus: BonusPp,

	/// Difference between the totals, or [None] when the hypothesis leaves
	/// the weighted top plays unchanged.
	pub gain: Option<f64>,

	/// 1-indexed position of a single inserted value in the new list.
	pub rank_position: Option<usize>,

	pub unchoked: Vec<UnchokedPlay>,
}

impl Recalculation {
	fn new(authoritative_total: f64, bonus: BonusPp, previous: &[f64], new: &[f64]) -> Self {
		let previous_weighted = weighted_total(previous);
		let new_weighted = weighted_total(new);
		let new_total = new_weighted + bonus.0;

		Self {
			previous_total: authoritative_total,
			new_total,
			bonus,
			gain: (new_weighted != previous_weighted).then(|| new_total - authoritative_total),
			rank_position: None,
			unchoked: Vec::new(),
		}
	}
}
// }}}
// {{{ Hypotheses
#[derive(Debug, Clone, PartialEq)]
pub enum Hypothesis {
	/// Merge these pp values into the best plays.
	Insert(Vec<f64>),

	/// Replace every play without a full combo by its full combo version.
	RemoveChokes,
}

fn validate_total(authoritative_total: f64) -> Result<(), TaggedError> {
	if !authoritative_total.is_finite() {
		return Err(anyhow!("The total pp reported for this player is not a number")
			.tag(ErrorKind::InvalidInput));
	}

	Ok(())
}

/// Recomputes a total after merging new pp values into the best plays.
pub fn insert_plays(
	best_values: &[f64],
	authoritative_total: f64,
	inserted: &[f64],
) -> Result<Recalculation, TaggedError> {
	validate_total(authoritative_total)?;

	if inserted.is_empty() {
		return Err(anyhow!("Specify at least one pp value.").tag(ErrorKind::InvalidInput));
	}

	if let Some(invalid) = inserted.iter().find(|v| !v.is_finite() || **v < 0.0) {
		return Err(anyhow!("`{invalid}` is not a valid pp value.").tag(ErrorKind::InvalidInput));
	}

	let previous = sorted_copy(best_values);
	let bonus = BonusPp::extract(authoritative_total, &previous);

	let mut merged = previous.clone();
	merged.extend_from_slice(inserted);
	sort_descending(&mut merged);

	let mut result = Recalculation::new(authoritative_total, bonus, &previous, &merged);

	if let [value] = inserted {
		result.rank_position = merged.iter().position(|v| v == value).map(|i| i + 1);
	}

	debug!(
		previous = result.previous_total,
		new = result.new_total,
		inserted = inserted.len(),
		"Recomputed total with inserted plays"
	);

	Ok(result)
}
// }}}
// {{{ Engine
/// Evaluates hypotheses which need to look at the plays themselves.
pub struct RecalculationEngine<'a, B> {
	formulas: &'a FormulaRegistry,
	beatmaps: &'a B,
}

impl<'a, B: BeatmapStore> RecalculationEngine<'a, B> {
	#[inline]
	pub fn new(formulas: &'a FormulaRegistry, beatmaps: &'a B) -> Self {
		Self { formulas, beatmaps }
	}

	pub fn recalculate(
		&self,
		best: &[Play],
		authoritative_total: f64,
		hypothesis: &Hypothesis,
	) -> Result<Recalculation, TaggedError> {
		match hypothesis {
			Hypothesis::Insert(values) => {
				let best_values = best.iter().map(|p| p.pp).collect::<Vec<_>>();
				insert_plays(&best_values, authoritative_total, values)
			}
			Hypothesis::RemoveChokes => self.remove_chokes(best, authoritative_total),
		}
	}

	// {{{ Choke removal
	fn unchoke(&self, play: &Play) -> Result<Play, TaggedError> {
		let beatmap = self.beatmaps.get(play.beatmap_id)?;
		let formula = self.formulas.by_version(&play.formula_version).ok_or_else(|| {
			anyhow!(
				"No performance formula is available for version `{}`",
				play.formula_version
			)
			.tag(ErrorKind::UpstreamUnavailable)
		})?;

		let pp = formula.calculate(play, &beatmap, true).ok_or_else(|| {
			anyhow!(
				"Formula `{}` cannot compute full combo pp on {}",
				play.formula_version,
				beatmap.display_title()
			)
			.tag(ErrorKind::UpstreamUnavailable)
		})?;

		let mut fixed = play.without_chokes(&beatmap);
		fixed.pp = pp;
		Ok(fixed)
	}

	/// Recomputes a total as if every play had been a full combo.
	pub fn remove_chokes(
		&self,
		best: &[Play],
		authoritative_total: f64,
	) -> Result<Recalculation, TaggedError> {
		validate_total(authoritative_total)?;

		let mut unchoked = Vec::new();
		let mut values = Vec::with_capacity(best.len());

		for (index, play) in best.iter().enumerate() {
			if play.full_combo {
				values.push(play.pp);
				continue;
			}

			let fixed = self.unchoke(play)?;
			values.push(fixed.pp);
			unchoked.push(UnchokedPlay {
				index,
				previous_pp: play.pp,
				play: fixed,
			});
		}

		let previous = sorted_copy(&best.iter().map(|p| p.pp).collect::<Vec<_>>());
		let bonus = BonusPp::extract(authoritative_total, &previous);
		sort_descending(&mut values);

		let mut result = Recalculation::new(authoritative_total, bonus, &previous, &values);
		result.unchoked = unchoked;

		debug!(
			previous = result.previous_total,
			new = result.new_total,
			unchoked = result.unchoked.len(),
			"Recomputed total without chokes"
		);

		Ok(result)
	}
	// }}}
}
// }}}
// {{{ Tests
#[cfg(test)]
mod recalc_tests {
	use std::collections::HashMap;

	use super::*;
	use crate::osu::beatmap::BeatmapMeta;
	use crate::osu::mode::Mode;
	use crate::osu::mods::Mods;
	use crate::osu::performance::PerformanceFormula;
	use crate::osu::play::play_tests::{beatmap, choked_play};

	const EPSILON: f64 = 1e-6;

	// {{{ Weighting
	#[test]
	fn weighted_total_matches_closed_form() {
		let values = [250.0, 200.0, 180.0, 150.0, 100.0, 50.0];
		let expected = 250.0
			+ 200.0 * 0.95
			+ 180.0 * 0.95f64.powi(2)
			+ 150.0 * 0.95f64.powi(3)
			+ 100.0 * 0.95f64.powi(4)
			+ 50.0 * 0.95f64.powi(5);

		assert!((weighted_total(&values) - expected).abs() < EPSILON);
	}

	#[test]
	fn only_top_hundred_plays_count() {
		let values = vec![10.0; 150];
		let expected: f64 = (0..100).map(|i| 10.0 * 0.95f64.powi(i)).sum();
		assert!((weighted_total(&values) - expected).abs() < EPSILON);
	}

	#[test]
	fn raising_a_play_never_lowers_the_total() {
		let values = (0..120).map(|i| 400.0 - i as f64 * 3.0).collect::<Vec<_>>();
		let before = weighted_total(&values);

		for i in 0..values.len() {
			let mut raised = values.clone();
			raised[i] += 25.0;
			sort_descending(&mut raised);
			assert!(weighted_total(&raised) >= before);
		}
	}
	// }}}
	// {{{ Bonus
	#[test]
	fn bonus_is_whatever_the_weighted_sum_misses() {
		let bonus = BonusPp::extract(8000.0, &[7600.0]);
		assert!((bonus.0 - 400.0).abs() < EPSILON);

		let expected = 400.0f64.min(416.32) / 416.32 * 100.0;
		assert!((bonus.percentage_filled() - expected).abs() < EPSILON);
		assert!((bonus.percentage_filled() - 96.08).abs() < 0.01);
	}

	#[test]
	fn bonus_percentage_is_capped() {
		assert!((BonusPp(500.0).percentage_filled() - 100.0).abs() < EPSILON);
	}

	#[test]
	fn negative_bonus_is_propagated() -> Result<(), TaggedError> {
		let result = insert_plays(&[200.0], 100.0, &[50.0])?;

		assert!(result.bonus.is_inconsistent());
		assert!((result.bonus.0 + 100.0).abs() < EPSILON);
		assert!((result.new_total - (200.0 + 50.0 * 0.95 - 100.0)).abs() < EPSILON);

		Ok(())
	}
	// }}}
	// {{{ Insertion
	#[test]
	fn inserting_a_play_reports_its_rank() -> Result<(), TaggedError> {
		let best = [250.0, 200.0, 150.0, 100.0, 50.0];
		let total = weighted_total(&best) + 300.0;
		let result = insert_plays(&best, total, &[180.0])?;

		let expected = 250.0
			+ 200.0 * 0.95
			+ 180.0 * 0.95f64.powi(2)
			+ 150.0 * 0.95f64.powi(3)
			+ 100.0 * 0.95f64.powi(4)
			+ 50.0 * 0.95f64.powi(5);

		assert_eq!(result.rank_position, Some(3));
		assert!((result.new_total - (expected + 300.0)).abs() < EPSILON);
		assert!((result.gain.unwrap() - (expected - weighted_total(&best))).abs() < EPSILON);

		Ok(())
	}

	#[test]
	fn equal_values_rank_at_their_first_position() -> Result<(), TaggedError> {
		let best = [250.0, 200.0, 200.0, 150.0];
		let result = insert_plays(&best, 1000.0, &[200.0])?;
		assert_eq!(result.rank_position, Some(2));

		Ok(())
	}

	#[test]
	fn multiple_insertions_have_no_rank() -> Result<(), TaggedError> {
		let result = insert_plays(&[300.0, 200.0], 600.0, &[250.0, 250.0])?;
		assert_eq!(result.rank_position, None);
		assert!(result.gain.unwrap() > 0.0);

		Ok(())
	}

	#[test]
	fn plays_below_the_top_hundred_gain_nothing() -> Result<(), TaggedError> {
		let best = vec![100.0; 100];
		let total = weighted_total(&best) + 200.0;
		let result = insert_plays(&best, total, &[1.0])?;

		assert_eq!(result.gain, None);
		assert_eq!(result.rank_position, Some(101));

		Ok(())
	}

	#[test]
	fn invalid_values_are_rejected() {
		for values in [vec![], vec![f64::NAN], vec![-5.0], vec![100.0, f64::INFINITY]] {
			let err = insert_plays(&[100.0], 200.0, &values).unwrap_err();
			assert_eq!(err.kind, ErrorKind::InvalidInput);
		}
	}

	#[test]
	fn insertion_is_deterministic() -> Result<(), TaggedError> {
		let best = [321.5, 300.25, 299.0, 120.0];
		let a = insert_plays(&best, 1200.0, &[300.25])?;
		let b = insert_plays(&best, 1200.0, &[300.25])?;

		assert_eq!(a.new_total.to_bits(), b.new_total.to_bits());
		assert_eq!(a.rank_position, b.rank_position);

		Ok(())
	}
	// }}}
	// {{{ Choke removal
	struct Doubling;

	impl PerformanceFormula for Doubling {
		fn calculate(&self, play: &Play, _: &BeatmapMeta, as_full_combo: bool) -> Option<f64> {
			Some(if as_full_combo { play.pp * 2.0 } else { play.pp })
		}

		fn simulate(&self, _: &BeatmapMeta, _: Mode, _: Mods) -> Option<f64> {
			None
		}
	}

	fn setup() -> (FormulaRegistry, HashMap<u32, BeatmapMeta>) {
		let mut formulas = FormulaRegistry::default();
		formulas.register("ppv2", Doubling);

		let beatmaps = (1..=3).map(|id| (id, beatmap(id, 1400))).collect();
		(formulas, beatmaps)
	}

	fn full_combo(beatmap_id: u32, pp: f64) -> Play {
		let mut play = choked_play(beatmap_id, pp);
		play.judgements = play.judgements.without_misses();
		play.full_combo = true;
		play
	}

	#[test]
	fn chokes_are_replaced_by_full_combos() -> Result<(), TaggedError> {
		let (formulas, beatmaps) = setup();
		let engine = RecalculationEngine::new(&formulas, &beatmaps);

		let best = [full_combo(1, 300.0), choked_play(2, 200.0)];
		let total = weighted_total(&[300.0, 200.0]) + 10.0;
		let result = engine.recalculate(&best, total, &Hypothesis::RemoveChokes)?;

		assert!((result.new_total - (400.0 + 300.0 * 0.95 + 10.0)).abs() < EPSILON);
		assert_eq!(result.unchoked.len(), 1);

		let unchoked = &result.unchoked[0];
		assert_eq!(unchoked.index, 1);
		assert_eq!(unchoked.play.judgements.count_miss, 0);
		assert_eq!(unchoked.play.max_combo, 1400);
		assert!((unchoked.gain() - 200.0).abs() < EPSILON);

		Ok(())
	}

	#[test]
	fn full_combo_lists_are_unchanged() -> Result<(), TaggedError> {
		let (formulas, beatmaps) = setup();
		let engine = RecalculationEngine::new(&formulas, &beatmaps);

		let best = [full_combo(1, 300.0), full_combo(2, 200.0)];
		let result = engine.remove_chokes(&best, 600.0)?;

		assert_eq!(result.gain, None);
		assert!(result.unchoked.is_empty());

		Ok(())
	}

	#[test]
	fn unknown_formulas_abort_the_recalculation() {
		let (formulas, beatmaps) = setup();
		let engine = RecalculationEngine::new(&formulas, &beatmaps);

		let mut play = choked_play(1, 200.0);
		play.formula_version = "relax-v9".to_string();

		let err = engine.remove_chokes(&[play], 300.0).unwrap_err();
		assert_eq!(err.kind, ErrorKind::UpstreamUnavailable);
	}

	#[test]
	fn missing_beatmaps_abort_the_recalculation() {
		let (formulas, beatmaps) = setup();
		let engine = RecalculationEngine::new(&formulas, &beatmaps);

		let err = engine
			.remove_chokes(&[choked_play(42, 200.0)], 300.0)
			.unwrap_err();
		assert_eq!(err.kind, ErrorKind::NotFound);
	}

	#[test]
	fn insertion_through_the_engine() -> Result<(), TaggedError> {
		let (formulas, beatmaps) = setup();
		let engine = RecalculationEngine::new(&formulas, &beatmaps);

		let best = [full_combo(1, 300.0), choked_play(2, 200.0)];
		let result = engine.recalculate(&best, 600.0, &Hypothesis::Insert(vec![250.0]))?;
		assert_eq!(result.rank_position, Some(2));

		Ok(())
	}
	// }}}
}
// }}}
