use chrono::NaiveDateTime;

use super::beatmap::BeatmapMeta;
use super::mode::Mode;
use super::mods::Mods;
use super::score::{Grade, Judgements};

// {{{ Play
/// A single scored attempt, as reported by a game server.
#[derive(Debug, Clone, PartialEq)]
pub struct Play {
	/// Server-side score id, `0` when the server didn't report one.
	pub id: u64,
	pub beatmap_id: u32,
	pub mode: Mode,
	pub mods: Mods,
	pub judgements: Judgements,
	pub max_combo: u32,
	pub accuracy: f64,
	pub grade: Grade,
	pub score: u64,
	pub pp: f64,
	pub full_combo: bool,

	/// Tag of the performance formula the pp value was computed with.
	pub formula_version: String,
	pub created_at: Option<NaiveDateTime>,
}

impl Play {
	/// What this play would have looked like without any combo breaks.
	///
	/// The pp value is left untouched, since recomputing it is the job of
	/// the formula the play was scored with.
	pub fn without_chokes(&self, beatmap: &BeatmapMeta) -> Self {
		if self.full_combo {
			return self.clone();
		}

		let judgements = self.judgements.without_misses();
		let accuracy = judgements.accuracy();

		Self {
			judgements,
			accuracy,
			grade: Grade::from_accuracy(accuracy, self.mods),
			max_combo: beatmap.max_combo.max(self.max_combo),
			full_combo: true,
			..self.clone()
		}
	}

	#[inline]
	pub fn display_stats(&self, beatmap_max_combo: Option<u32>) -> String {
		let j = &self.judgements;
		let max_combo = beatmap_max_combo
			.map(|c| c.to_string())
			.unwrap_or_else(|| "?".to_string());

		format!(
			"{}/{}/{}/{} {:.2}% {}x/{}x **{}**",
			j.count_300,
			j.count_100,
			j.count_50,
			j.count_miss,
			self.accuracy,
			self.max_combo,
			max_combo,
			self.grade
		)
	}
}
// }}}
