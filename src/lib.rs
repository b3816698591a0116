pub mod app;
pub mod auth;
pub mod catalog;
pub mod coach;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod heatmap;
pub mod models;
pub mod state;
pub mod storage;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use heatmap::{build_grid, intensity_level, legend, HeatmapGrid};
pub use state::AppState;
pub use storage::{JsonFileStorage, MemoryStorage, Storage};
