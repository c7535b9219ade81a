use std::fmt::Display;

/// The modifier bitmask attached to every play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Mods(pub u32);

impl Mods {
	pub const NONE: Self = Self(0);
	pub const NO_FAIL: Self = Self(1);
	pub const EASY: Self = Self(1 << 1);
	pub const TOUCH_DEVICE: Self = Self(1 << 2);
	pub const HIDDEN: Self = Self(1 << 3);
	pub const HARD_ROCK: Self = Self(1 << 4);
	pub const SUDDEN_DEATH: Self = Self(1 << 5);
	pub const DOUBLE_TIME: Self = Self(1 << 6);
	pub const RELAX: Self = Self(1 << 7);
	pub const HALF_TIME: Self = Self(1 << 8);
	pub const NIGHTCORE: Self = Self(1 << 9);
	pub const FLASHLIGHT: Self = Self(1 << 10);
	pub const SPUN_OUT: Self = Self(1 << 12);
	pub const AUTOPILOT: Self = Self(1 << 13);
	pub const PERFECT: Self = Self(1 << 14);
	pub const FADE_IN: Self = Self(1 << 20);
	pub const SCORE_V2: Self = Self(1 << 29);

	/// Display order used when rendering acronyms.
	const ACRONYMS: [(Self, &'static str); 16] = [
		(Self::NO_FAIL, "NF"),
		(Self::EASY, "EZ"),
		(Self::TOUCH_DEVICE, "TD"),
		(Self::HIDDEN, "HD"),
		(Self::FADE_IN, "FI"),
		(Self::HARD_ROCK, "HR"),
		(Self::SUDDEN_DEATH, "SD"),
		(Self::PERFECT, "PF"),
		(Self::DOUBLE_TIME, "DT"),
		(Self::NIGHTCORE, "NC"),
		(Self::HALF_TIME, "HT"),
		(Self::FLASHLIGHT, "FL"),
		(Self::RELAX, "RX"),
		(Self::AUTOPILOT, "AP"),
		(Self::SPUN_OUT, "SO"),
		(Self::SCORE_V2, "V2"),
	];

	#[inline]
	pub fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	#[inline]
	pub fn intersects(self, other: Self) -> bool {
		self.0 & other.0 != 0
	}

	/// Whether any mod hiding part of the playfield is enabled. This is what
	/// turns the top grades into their silver variants.
	#[inline]
	pub fn reduces_vision(self) -> bool {
		self.intersects(Self(Self::HIDDEN.0 | Self::FLASHLIGHT.0 | Self::FADE_IN.0))
	}
}

impl Display for Mods {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut any = false;
		for (mods, acronym) in Self::ACRONYMS {
			if !self.contains(mods) {
				continue;
			}

			// NC and PF always come with the mod they extend
			if (mods == Self::DOUBLE_TIME && self.contains(Self::NIGHTCORE))
				|| (mods == Self::SUDDEN_DEATH && self.contains(Self::PERFECT))
			{
				continue;
			}

			write!(f, "{acronym}")?;
			any = true;
		}

		if !any {
			write!(f, "NM")?;
		}

		Ok(())
	}
}
