pub mod beatmap;
pub mod mode;
pub mod mods;
pub mod performance;
pub mod play;
pub mod recalc;
pub mod score;
