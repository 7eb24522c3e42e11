//! Eigo Browser: the orchestration core of a tabbed browser shell with a
//! tap-to-look-up translation mode.
//!
//! The crate owns tabs and their render surfaces, the active tab, the tab
//! overview, session persistence and the translation-mode scripts. Web
//! content hosts sit behind [`surface::RenderSurface`]; the library ships a
//! headless implementation and, with the `gui` feature, a `wry` one.

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod surface;
pub mod types;

#[cfg(feature = "gui")]
pub mod ui;
