//! Point-in-time captures of a player's statistics, and the field table
//! used to compare two of them.

// {{{ Imports
use std::fmt::Write;

use chrono::NaiveDateTime;
use rusqlite::Row;

use crate::osu::mode::{Mode, Variant};
// }}}

// {{{ Keys
/// Identifies the statistics of one player in one ranking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
	pub server: String,
	pub player_id: u64,
	pub mode: Mode,
	pub variant: Variant,
}

/// A [SnapshotKey] as seen by a specific viewer. Every viewer tracks their
/// own progress window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointKey {
	pub target: SnapshotKey,
	pub viewer_id: u64,
}
// }}}
// {{{ Stat fields
/// Every statistic a server may report. Fields the server doesn't know
/// about stay [None].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatFields {
	pub ranked_score: Option<i64>,
	pub total_score: Option<i64>,
	pub total_hits: Option<i64>,
	pub play_count: Option<i64>,
	/// In seconds
	pub play_time: Option<i64>,
	pub replays_watched: Option<i64>,
	pub level: Option<f64>,
	pub accuracy: Option<f64>,
	pub max_combo: Option<i64>,
	pub global_rank: Option<i64>,
	pub country_rank: Option<i64>,
	pub pp: Option<f64>,
	pub global_score_rank: Option<i64>,
	pub country_score_rank: Option<i64>,
	pub first_places: Option<i64>,
}

impl StatFields {
	pub(crate) fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
		Ok(Self {
			ranked_score: row.get("ranked_score")?,
			total_score: row.get("total_score")?,
			total_hits: row.get("total_hits")?,
			play_count: row.get("play_count")?,
			play_time: row.get("play_time")?,
			replays_watched: row.get("replays_watched")?,
			level: row.get("level")?,
			accuracy: row.get("accuracy")?,
			max_combo: row.get("max_combo")?,
			global_rank: row.get("global_rank")?,
			country_rank: row.get("country_rank")?,
			pp: row.get("pp")?,
			global_score_rank: row.get("global_score_rank")?,
			country_score_rank: row.get("country_score_rank")?,
			first_places: row.get("first_places")?,
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSnapshot {
	pub key: SnapshotKey,
	pub captured_at: NaiveDateTime,
	pub fields: StatFields,
}
// }}}
// {{{ Stat values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
	Integer(i64),
	Decimal(f64),
}

impl StatValue {
	#[inline]
	fn checked_sub(self, other: Self) -> Option<Self> {
		match (self, other) {
			(Self::Integer(a), Self::Integer(b)) => a.checked_sub(b).map(Self::Integer),
			(Self::Decimal(a), Self::Decimal(b)) => Some(Self::Decimal(a - b)),
			_ => None,
		}
	}

	#[inline]
	pub fn as_f64(self) -> f64 {
		match self {
			Self::Integer(i) => i as f64,
			Self::Decimal(f) => f,
		}
	}

	#[inline]
	pub fn is_zero(self) -> bool {
		self.as_f64() == 0.0
	}
}
// }}}
// {{{ Field descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	HigherIsBetter,
	LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
	/// An integer with thousands separators.
	Grouped {
		prefix: &'static str,
		suffix: &'static str,
	},
	Fixed {
		places: usize,
		suffix: &'static str,
	},
	/// Displayed as the whole level plus progress towards the next one.
	Level,
	/// Stored in seconds, displayed in hours, deltas in minutes.
	PlayTime,
}

pub struct FieldDescriptor {
	pub id: &'static str,
	pub label: &'static str,
	pub direction: Direction,
	pub format: FieldFormat,
	pub get: fn(&StatFields) -> Option<StatValue>,
}

const COUNT: FieldFormat = FieldFormat::Grouped {
	prefix: "",
	suffix: "",
};

const RANK: FieldFormat = FieldFormat::Grouped {
	prefix: "#",
	suffix: "",
};

/// Every tracked field, in display order.
pub static FIELDS: [FieldDescriptor; 15] = [
	FieldDescriptor {
		id: "ranked_score",
		label: "Ranked score",
		direction: Direction::HigherIsBetter,
		format: COUNT,
		get: |f| f.ranked_score.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "total_score",
		label: "Total score",
		direction: Direction::HigherIsBetter,
		format: COUNT,
		get: |f| f.total_score.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "total_hits",
		label: "Total hits",
		direction: Direction::HigherIsBetter,
		format: COUNT,
		get: |f| f.total_hits.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "play_count",
		label: "Play count",
		direction: Direction::HigherIsBetter,
		format: COUNT,
		get: |f| f.play_count.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "play_time",
		label: "Play time",
		direction: Direction::HigherIsBetter,
		format: FieldFormat::PlayTime,
		get: |f| f.play_time.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "replays_watched",
		label: "Replays watched",
		direction: Direction::HigherIsBetter,
		format: COUNT,
		get: |f| f.replays_watched.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "level",
		label: "Level",
		direction: Direction::HigherIsBetter,
		format: FieldFormat::Level,
		get: |f| f.level.map(StatValue::Decimal),
	},
	FieldDescriptor {
		id: "accuracy",
		label: "Accuracy",
		direction: Direction::HigherIsBetter,
		format: FieldFormat::Fixed {
			places: 2,
			suffix: "%",
		},
		get: |f| f.accuracy.map(StatValue::Decimal),
	},
	FieldDescriptor {
		id: "max_combo",
		label: "Max combo",
		direction: Direction::HigherIsBetter,
		format: FieldFormat::Grouped {
			prefix: "",
			suffix: "x",
		},
		get: |f| f.max_combo.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "global_rank",
		label: "Global rank",
		direction: Direction::LowerIsBetter,
		format: RANK,
		get: |f| f.global_rank.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "country_rank",
		label: "Country rank",
		direction: Direction::LowerIsBetter,
		format: RANK,
		get: |f| f.country_rank.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "pp",
		label: "Performance points",
		direction: Direction::HigherIsBetter,
		format: FieldFormat::Fixed {
			places: 0,
			suffix: "pp",
		},
		get: |f| f.pp.map(StatValue::Decimal),
	},
	FieldDescriptor {
		id: "global_score_rank",
		label: "Global score rank",
		direction: Direction::LowerIsBetter,
		format: RANK,
		get: |f| f.global_score_rank.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "country_score_rank",
		label: "Country score rank",
		direction: Direction::LowerIsBetter,
		format: RANK,
		get: |f| f.country_score_rank.map(StatValue::Integer),
	},
	FieldDescriptor {
		id: "first_places",
		label: "First places",
		direction: Direction::HigherIsBetter,
		format: COUNT,
		get: |f| f.first_places.map(StatValue::Integer),
	},
];
// }}}
// {{{ Deltas
/// The change of one field between two snapshots, oriented so that a
/// positive delta is always an improvement.
pub struct FieldDelta {
	pub descriptor: &'static FieldDescriptor,
	pub current: Option<StatValue>,

	/// [None] whenever either side of the comparison is missing.
	pub delta: Option<StatValue>,
}

pub fn compute_deltas(current: &StatFields, baseline: &StatFields) -> Vec<FieldDelta> {
	FIELDS
		.iter()
		.map(|descriptor| {
			let now = (descriptor.get)(current);
			let before = (descriptor.get)(baseline);

			let delta = match (now, before) {
				(Some(now), Some(before)) => match descriptor.direction {
					Direction::HigherIsBetter => now.checked_sub(before),
					Direction::LowerIsBetter => before.checked_sub(now),
				},
				_ => None,
			};

			FieldDelta {
				descriptor,
				current: now,
				delta,
			}
		})
		.collect()
}
// }}}
// {{{ Rendering
#[inline]
fn push_grouped(result: &mut String, digits: &str) {
	for (i, c) in digits.chars().enumerate() {
		if i > 0 && (digits.len() - i) % 3 == 0 {
			result.push(',');
		}
		result.push(c);
	}
}

/// Formats an integer with `,` between every group of three digits.
pub fn group_digits(value: i64) -> String {
	let digits = value.unsigned_abs().to_string();
	let mut result = String::with_capacity(digits.len() + digits.len() / 3 + 1);

	if value < 0 {
		result.push('-');
	}

	push_grouped(&mut result, &digits);
	result
}

/// Like [group_digits], for numbers with a fractional part.
pub fn group_decimal(value: f64, places: usize) -> String {
	let formatted = format!("{:.places$}", value.abs());
	let (whole, fraction) = match formatted.split_once('.') {
		Some((whole, fraction)) => (whole, Some(fraction)),
		None => (formatted.as_str(), None),
	};

	let mut result = String::with_capacity(formatted.len() + whole.len() / 3 + 1);
	if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
		result.push('-');
	}

	push_grouped(&mut result, whole);
	if let Some(fraction) = fraction {
		result.push('.');
		result.push_str(fraction);
	}

	result
}

#[inline]
fn sign(value: f64) -> &'static str {
	if value > 0.0 {
		"+"
	} else {
		""
	}
}

impl FieldDelta {
	fn render_value(&self, value: StatValue) -> String {
		match (self.descriptor.format, value) {
			(FieldFormat::Grouped { prefix, suffix }, StatValue::Integer(i)) => {
				format!("{prefix}{}{suffix}", group_digits(i))
			}
			(FieldFormat::Fixed { places, suffix }, value) => {
				format!("{:.places$}{suffix}", value.as_f64())
			}
			(FieldFormat::Level, value) => {
				let level = value.as_f64();
				format!("{} +{:.2}%", level.trunc(), level.fract() * 100.0)
			}
			(FieldFormat::PlayTime, value) => format!("{:.2}h", value.as_f64() / 3600.0),
			(FieldFormat::Grouped { prefix, suffix }, value) => {
				format!("{prefix}{}{suffix}", value.as_f64())
			}
		}
	}

	fn render_delta(&self, delta: StatValue) -> String {
		let raw = delta.as_f64();
		match (self.descriptor.format, delta) {
			(FieldFormat::Grouped { .. }, StatValue::Integer(i)) => {
				format!("({}{})", sign(raw), group_digits(i))
			}
			(FieldFormat::Grouped { .. }, _) => format!("({}{raw})", sign(raw)),
			(FieldFormat::Fixed { places, .. }, _) => format!("({}{raw:.places$})", sign(raw)),
			(FieldFormat::Level, _) => format!("({}{:.2}%)", sign(raw), raw * 100.0),
			(FieldFormat::PlayTime, _) => format!("({}{:.2}m)", sign(raw), raw / 60.0),
		}
	}

	/// Renders the current value, followed by the delta on its own line
	/// when there is a non-zero one.
	pub fn render(&self) -> String {
		let Some(current) = self.current else {
			return "-".to_string();
		};

		let mut result = self.render_value(current);
		if let Some(delta) = self.delta.filter(|d| !d.is_zero()) {
			// Writing to a string can't fail
			let _ = write!(result, "\n{}", self.render_delta(delta));
		}

		result
	}
}
// }}}
