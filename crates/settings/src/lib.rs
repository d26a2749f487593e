mod debounce;
mod store;

pub use debounce::{DEFAULT_SAVE_DEBOUNCE, DebouncedSettings};
pub use store::{SETTINGS_DIRECTORY_NAME, SETTINGS_FILE_NAME, SettingsError, SettingsStore};
