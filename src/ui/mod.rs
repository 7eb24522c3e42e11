//! Desktop UI layer.
//!
//! Uses `wry` for cross-platform WebView rendering:
//! - Windows: WebView2
//! - Linux: WebKitGTK
//! - macOS: WKWebView
//!
//! Tab pages are child webviews wrapped as render surfaces; the browser
//! chrome is one more webview rendering state pushed from Rust.

pub mod webview_app;
pub mod wry_surface;
