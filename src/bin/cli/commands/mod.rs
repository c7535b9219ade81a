pub mod archive;
pub mod whatif;
