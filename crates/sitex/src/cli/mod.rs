mod app;
mod artifact;
mod export;
mod host;
mod jobs;
mod logs;
mod table;

pub use app::App;
