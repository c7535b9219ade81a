#![allow(async_fn_in_trait)]

pub mod commands;
pub mod context;
pub mod logs;
pub mod osu;
pub mod servers;
pub mod stats;
pub mod time;
pub mod user;
