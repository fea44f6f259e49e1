pub mod app;
pub mod braille;
pub mod choropleth;
pub mod config;
pub mod data;
pub mod error;
pub mod hash;
pub mod interaction;
pub mod map;
pub mod ui;

pub use config::MapConfig;
pub use error::{MapError, Result};
