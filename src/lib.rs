pub mod carve;
pub mod chunk;
pub mod classify;
pub mod cli;
pub mod config;
pub mod constants;
pub mod evidence;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod reduce;
pub mod sink;
pub mod strings;
