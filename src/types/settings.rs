use serde::{Deserialize, Serialize};

/// Top-level browser settings container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BrowserSettings {
    pub general: GeneralSettings,
    pub session: SessionSettings,
    pub chrome: ChromeSettings,
    pub translation: TranslationSettings,
    pub backend: BackendSettings,
    pub handoff: HandoffSettings,
}

/// Navigation defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralSettings {
    /// Loaded by the bootstrap tab and by the tab synthesized after closing the last one.
    pub default_url: String,
    /// Loaded by `add_tab` when no URL is given.
    pub new_tab_url: String,
    /// Address-bar input that does not look like a URL is appended here, form-encoded.
    pub search_url_prefix: String,
    pub user_agent: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            default_url: "https://www.reddit.com/".to_string(),
            new_tab_url: "https://bbc.com".to_string(),
            search_url_prefix: "https://www.google.com/search?q=".to_string(),
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1".to_string(),
        }
    }
}

/// Session persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    pub restore_on_launch: bool,
    pub save_debounce_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            restore_on_launch: true,
            save_debounce_ms: 1000,
        }
    }
}

/// Scroll-driven chrome hiding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChromeSettings {
    /// Offsets at or above the top of the page up to this value always show the chrome.
    pub top_zone: f64,
    /// Minimum offset delta before the direction changes.
    pub scroll_threshold: f64,
}

impl Default for ChromeSettings {
    fn default() -> Self {
        Self {
            top_zone: 50.0,
            scroll_threshold: 10.0,
        }
    }
}

/// Word lookup behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationSettings {
    pub speech_language: String,
    /// Text-to-speech program, invoked as `<cmd> -v <language> <text>`.
    pub speech_command: String,
    /// Selections up to this many characters without a space get a dictionary lookup.
    pub dictionary_max_chars: usize,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            speech_language: "en-US".to_string(),
            speech_command: "espeak-ng".to_string(),
            dictionary_max_chars: 30,
        }
    }
}

/// Explanation backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub api_key: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            api_key: String::new(),
        }
    }
}

/// Cross-process URL hand-off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HandoffSettings {
    pub url_scheme: String,
    pub shared_url_key: String,
}

impl Default for HandoffSettings {
    fn default() -> Self {
        Self {
            url_scheme: "eigobrowser".to_string(),
            shared_url_key: "SharedURL".to_string(),
        }
    }
}
