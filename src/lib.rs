#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod logging;
pub mod navigation;
pub mod pager;
pub mod source;
pub mod storage;
pub mod store;
pub mod terminal;
pub mod view;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
