// Services
// Leaf functionality with little or no state: scroll classification, page
// scripts, key-value storage, URL hand-off, the explanation backend, speech,
// settings and address-bar input.

pub mod explain_client;
pub mod key_value_store;
pub mod scroll_classifier;
pub mod settings_engine;
pub mod speech;
pub mod translation_mode;
pub mod url_handoff;
pub mod url_input;
