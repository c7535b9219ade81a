use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;

use super::mods::Mods;

// {{{ Judgements
/// Hit counts of a single play, grouped by judgement tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Judgements {
	pub count_300: u32,
	pub count_100: u32,
	pub count_50: u32,
	pub count_miss: u32,

	// Only meaningful outside of standard
	pub count_geki: u32,
	pub count_katu: u32,
}

impl Judgements {
	#[inline]
	pub fn total_hits(&self) -> u32 {
		self.count_300 + self.count_100 + self.count_50 + self.count_miss
	}

	/// Standard accuracy, in percent.
	///
	/// Misses count towards the denominator, which makes this agree with
	/// the plain `300/100/50` ratio once they have been folded away.
	pub fn accuracy(&self) -> f64 {
		let total = self.total_hits();
		if total == 0 {
			return 0.0;
		}

		let points = 300 * self.count_300 as u64 + 100 * self.count_100 as u64 + 50 * self.count_50 as u64;
		points as f64 / (300 * total as u64) as f64 * 100.0
	}

	/// Counts every miss as if it had been hit at the best tier.
	#[inline]
	pub fn without_misses(self) -> Self {
		Self {
			count_300: self.count_300 + self.count_miss,
			count_miss: 0,
			..self
		}
	}
}
// }}}
// {{{ Grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grade {
	XH,
	X,
	SH,
	S,
	A,
	B,
	C,
	D,
}

impl Grade {
	pub const GRADES: [Self; 8] = [
		Self::XH,
		Self::X,
		Self::SH,
		Self::S,
		Self::A,
		Self::B,
		Self::C,
		Self::D,
	];
	pub const GRADE_STRINGS: [&'static str; 8] = ["XH", "X", "SH", "S", "A", "B", "C", "D"];

	#[inline]
	pub fn to_index(self) -> usize {
		self as usize
	}

	/// Derives a grade from accuracy alone, the way it is done for a play
	/// without misses.
	pub fn from_accuracy(accuracy: f64, mods: Mods) -> Self {
		let silver = mods.reduces_vision();
		if accuracy >= 100.0 {
			if silver {
				Self::XH
			} else {
				Self::X
			}
		} else if accuracy > 93.5 {
			if silver {
				Self::SH
			} else {
				Self::S
			}
		} else if accuracy > 90.0 {
			Self::A
		} else if accuracy > 80.0 {
			Self::B
		} else if accuracy > 70.0 {
			Self::C
		} else {
			Self::D
		}
	}
}

impl Display for Grade {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", Self::GRADE_STRINGS[self.to_index()])
	}
}

impl FromStr for Grade {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		for (i, grade) in Self::GRADE_STRINGS.iter().enumerate() {
			if s == *grade {
				return Ok(Self::GRADES[i]);
			}
		}

		Err(anyhow!("Cannot convert {s} to a grade"))
	}
}
// }}}
