pub mod config;
pub mod convert;
pub mod datum;
pub mod loader;
pub mod manifest;
pub mod store;
mod utils;
pub mod writer;

pub use config::{ConvertOptions, Opts};
pub use convert::{ConvertStats, convert, run};
