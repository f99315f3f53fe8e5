pub mod api;
pub mod config;
pub mod deps;
pub mod download;
pub mod logging;
pub mod output;
pub mod platform;
pub mod yt;
