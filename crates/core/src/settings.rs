use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::model::GenerationParameters;

pub const MOCK_PROVIDER_ID: &str = "mock";
pub const MOCK_PROVIDER_ENDPOINT: &str = "local://mock-provider";
pub const MOCK_DEFAULT_MODEL_ID: &str = "mock-text-1";

/// Wire protocol family spoken by a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Mock,
    OpenAi,
    Anthropic,
    Ollama,
    Custom,
}

/// One provider entry in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub default_model_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ProviderEntry {
    /// The built-in local mock entry present in fresh settings.
    pub fn mock_default() -> Self {
        Self {
            id: MOCK_PROVIDER_ID.to_string(),
            name: "Local Mock".to_string(),
            kind: ProviderKind::Mock,
            endpoint: MOCK_PROVIDER_ENDPOINT.to_string(),
            api_key_env: None,
            default_model_id: MOCK_DEFAULT_MODEL_ID.to_string(),
            enabled: true,
        }
    }
}

/// Global hotkey that raises the quick input bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    #[serde(default = "default_hotkey_key")]
    pub key: String,
    #[serde(default = "default_hotkey_modifiers")]
    pub modifiers: Vec<String>,
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self {
            key: default_hotkey_key(),
            modifiers: default_hotkey_modifiers(),
        }
    }
}

/// UI color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Tolerant parse; anything other than "light" keeps the dark default.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("light") {
            Self::Light
        } else {
            Self::Dark
        }
    }
}

/// User-editable application settings.
///
/// Every field carries a serde default, so partially written or older
/// settings files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderEntry>,
    #[serde(default = "default_selected_provider_id")]
    pub selected_provider_id: String,
    #[serde(default = "default_selected_model_id")]
    pub selected_model_id: String,
    #[serde(default)]
    pub parameters: GenerationParameters,
    #[serde(default)]
    pub hotkey: HotkeyBinding,
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme: ThemeMode,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            selected_provider_id: default_selected_provider_id(),
            selected_model_id: default_selected_model_id(),
            parameters: GenerationParameters::standard(),
            hotkey: HotkeyBinding::default(),
            theme: default_theme_mode(),
        }
    }
}

impl AppSettings {
    /// Looks up a provider entry by id.
    pub fn provider(&self, provider_id: &str) -> Option<&ProviderEntry> {
        self.providers.iter().find(|entry| entry.id == provider_id)
    }

    /// Entry currently selected for new requests.
    pub fn selected_provider(&self) -> Option<&ProviderEntry> {
        self.provider(&self.selected_provider_id)
    }

    /// Adds or replaces an entry, keyed by id.
    pub fn upsert_provider(&mut self, entry: ProviderEntry) {
        match self
            .providers
            .iter_mut()
            .find(|existing| existing.id == entry.id)
        {
            Some(existing) => *existing = entry,
            None => self.providers.push(entry),
        }
    }

    /// Removes an entry. When the selection pointed at the removed entry,
    /// it falls back to the first remaining one together with its default
    /// model.
    pub fn remove_provider(&mut self, provider_id: &str) {
        self.providers.retain(|entry| entry.id != provider_id);
        if self.selected_provider_id == provider_id
            && let Some(first) = self.providers.first()
        {
            self.selected_provider_id = first.id.clone();
            self.selected_model_id = first.default_model_id.clone();
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_providers() -> Vec<ProviderEntry> {
    vec![ProviderEntry::mock_default()]
}

fn default_selected_provider_id() -> String {
    MOCK_PROVIDER_ID.to_string()
}

fn default_selected_model_id() -> String {
    MOCK_DEFAULT_MODEL_ID.to_string()
}

fn default_hotkey_key() -> String {
    "K".to_string()
}

fn default_hotkey_modifiers() -> Vec<String> {
    vec!["command".to_string(), "option".to_string()]
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Dark
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(ThemeMode::parse(&value))
}
