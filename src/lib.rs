pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod posts;
pub mod state;
pub mod storage;
pub mod uploads;
pub mod users;

pub use app::build_app;
pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;
