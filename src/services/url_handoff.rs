//! Inbound URL hand-off.
//!
//! Two channels deliver "open this URL" requests from outside the process:
//! a custom scheme link of the form `scheme://open?url=<percent-encoded>`,
//! and a shared key-value slot the share extension writes and the app drains
//! when it returns to the foreground.

use tracing::{debug, warn};
use url::form_urlencoded;
use url::Url;

use crate::services::key_value_store::KeyValueStore;
use crate::types::errors::StoreError;

/// Extracts the target of a `scheme://open?url=...` link.
///
/// Anything else (other scheme, other command, missing or unparseable `url`
/// parameter) yields `None`.
pub fn parse_open_url(link: &str, scheme: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    if parsed.scheme() != scheme || parsed.host_str() != Some("open") {
        return None;
    }
    let target = parsed
        .query_pairs()
        .find(|(name, _)| name == "url")
        .map(|(_, value)| value.into_owned())?;
    Url::parse(&target).ok().map(|_| target)
}

/// Builds the link the share extension opens for `target`.
pub fn build_open_url(target: &str, scheme: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
    format!("{scheme}://open?url={encoded}")
}

/// Single pending-URL slot shared with the share extension.
pub struct SharedUrlSlot {
    store: Box<dyn KeyValueStore>,
    key: String,
}

impl SharedUrlSlot {
    pub fn new(store: Box<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Writes `url` into the slot, replacing anything pending.
    pub fn offer(&self, url: &str) -> Result<(), StoreError> {
        self.store.set(&self.key, url)
    }

    /// Returns and clears the pending URL. An unparseable value is cleared
    /// and dropped.
    pub fn take_pending(&self) -> Result<Option<String>, StoreError> {
        let Some(value) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        self.store.remove(&self.key)?;

        if Url::parse(&value).is_err() {
            warn!(value = %value, "discarding malformed shared URL");
            return Ok(None);
        }
        debug!(url = %value, "shared URL taken");
        Ok(Some(value))
    }
}
