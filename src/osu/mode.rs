use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

// {{{ Mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mode {
	Standard,
	Taiko,
	Catch,
	Mania,
}

impl Mode {
	pub const MODES: [Self; 4] = [Self::Standard, Self::Taiko, Self::Catch, Self::Mania];
	pub const MODE_STRINGS: [&'static str; 4] = ["std", "taiko", "ctb", "mania"];

	#[inline]
	pub fn to_index(self) -> usize {
		self as usize
	}

	#[inline]
	pub fn from_index(index: i64) -> Option<Self> {
		usize::try_from(index)
			.ok()
			.and_then(|i| Self::MODES.get(i).copied())
	}
}

impl Display for Mode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", Self::MODE_STRINGS[self.to_index()])
	}
}
// }}}
// {{{ Variant
/// A sub-toggle which partitions the rankings of a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Variant {
	#[default]
	Vanilla,
	Relax,
	Autopilot,
}

impl Variant {
	pub const VARIANTS: [Self; 3] = [Self::Vanilla, Self::Relax, Self::Autopilot];
	pub const VARIANT_SUFFIXES: [&'static str; 3] = ["", "_rx", "_ap"];

	#[inline]
	pub fn to_index(self) -> usize {
		self as usize
	}

	#[inline]
	pub fn from_index(index: i64) -> Option<Self> {
		usize::try_from(index)
			.ok()
			.and_then(|i| Self::VARIANTS.get(i).copied())
	}
}
// }}}
// {{{ Shorthands
/// Every (mode, variant) combination a server can rank, together with
/// the shorthand users type to select it.
pub const GAME_MODES: [(&str, Mode, Variant); 8] = [
	("std", Mode::Standard, Variant::Vanilla),
	("std_rx", Mode::Standard, Variant::Relax),
	("std_ap", Mode::Standard, Variant::Autopilot),
	("taiko", Mode::Taiko, Variant::Vanilla),
	("taiko_rx", Mode::Taiko, Variant::Relax),
	("ctb", Mode::Catch, Variant::Vanilla),
	("ctb_rx", Mode::Catch, Variant::Relax),
	("mania", Mode::Mania, Variant::Vanilla),
];

#[inline]
pub fn parse_game_mode(shorthand: &str) -> Option<(Mode, Variant)> {
	GAME_MODES
		.iter()
		.find(|(name, _, _)| *name == shorthand)
		.map(|(_, mode, variant)| (*mode, *variant))
}

#[inline]
pub fn game_mode_shorthand(mode: Mode, variant: Variant) -> String {
	format!(
		"{}{}",
		Mode::MODE_STRINGS[mode.to_index()],
		Variant::VARIANT_SUFFIXES[variant.to_index()]
	)
}

#[inline]
pub fn game_mode_list() -> String {
	GAME_MODES
		.iter()
		.map(|(name, _, _)| *name)
		.collect::<Vec<_>>()
		.join(", ")
}
// }}}
// {{{ Sqlite conversions
impl ToSql for Mode {
	fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
		Ok(ToSqlOutput::from(self.to_index() as i64))
	}
}

impl FromSql for Mode {
	fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
		let index = value.as_i64()?;
		Self::from_index(index).ok_or(FromSqlError::OutOfRange(index))
	}
}

impl ToSql for Variant {
	fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
		Ok(ToSqlOutput::from(self.to_index() as i64))
	}
}

impl FromSql for Variant {
	fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
		let index = value.as_i64()?;
		Self::from_index(index).ok_or(FromSqlError::OutOfRange(index))
	}
}
// }}}
