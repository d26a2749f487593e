use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::task::JoinHandle;

use sotto_core::AppSettings;

use crate::store::{SettingsError, SettingsStore};

pub const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Shared handle over the live settings value with debounced persistence.
///
/// Rapid mutations coalesce into a single disk write once the debounce
/// window goes quiet. A failed write keeps the value dirty so the next
/// scheduled save or flush retries; mutation itself never fails. Must be
/// used inside a tokio runtime.
#[derive(Clone)]
pub struct DebouncedSettings {
    inner: Arc<DebouncedInner>,
}

struct DebouncedInner {
    store: SettingsStore,
    current: ArcSwap<AppSettings>,
    dirty: AtomicBool,
    debounce: Duration,
    pending_save: Mutex<Option<JoinHandle<()>>>,
    save_status: Mutex<Option<String>>,
}

impl DebouncedSettings {
    pub fn new(store: SettingsStore) -> Self {
        Self::with_debounce(store, DEFAULT_SAVE_DEBOUNCE)
    }

    pub fn with_debounce(store: SettingsStore, debounce: Duration) -> Self {
        let initial = store.load();
        Self {
            inner: Arc::new(DebouncedInner {
                store,
                current: ArcSwap::from_pointee(initial),
                dirty: AtomicBool::new(false),
                debounce,
                pending_save: Mutex::new(None),
                save_status: Mutex::new(None),
            }),
        }
    }

    /// Cheap consistent snapshot of the live value.
    pub fn current(&self) -> Arc<AppSettings> {
        self.inner.current.load_full()
    }

    /// Applies one mutation. A mutation that changes nothing neither
    /// dirties the value nor schedules a write.
    pub fn update(&self, mutate: impl FnOnce(&mut AppSettings)) {
        let previous = self.inner.current.load_full();
        let mut next = AppSettings::clone(&previous);
        mutate(&mut next);
        if next == *previous {
            return;
        }

        self.inner.current.store(Arc::new(next));
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.schedule_save();
    }

    /// Cancels any pending debounce window and writes now when dirty.
    pub fn flush(&self) -> Result<(), SettingsError> {
        self.cancel_pending();
        self.inner.perform_save()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Last save failure line, cleared by the next successful save.
    pub fn save_status(&self) -> Option<String> {
        lock_recovered(&self.inner.save_status).clone()
    }

    fn schedule_save(&self) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            let _ = inner.perform_save();
        });

        let mut pending = lock_recovered(&self.inner.pending_save);
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_pending(&self) {
        let mut pending = lock_recovered(&self.inner.pending_save);
        if let Some(task) = pending.take() {
            task.abort();
        }
    }
}

impl DebouncedInner {
    fn perform_save(&self) -> Result<(), SettingsError> {
        // Take the dirty token up front: a concurrent update re-dirties and
        // schedules its own save, so a stale write here cannot lose data.
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let settings = self.current.load_full();
        match self.store.save(&settings) {
            Ok(()) => {
                *lock_recovered(&self.save_status) = None;
                Ok(())
            }
            Err(error) => {
                self.dirty.store(true, Ordering::SeqCst);
                tracing::warn!(error = %error, "failed to save settings, will retry");
                *lock_recovered(&self.save_status) =
                    Some(format!("Failed to save settings: {error}"));
                Err(error)
            }
        }
    }
}

fn lock_recovered<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_temperature(store_path: &std::path::Path) -> f64 {
        let content = std::fs::read_to_string(store_path).unwrap();
        let settings: AppSettings = serde_json::from_str(&content).unwrap();
        settings.parameters.temperature
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_updates_coalesce_into_one_write_with_the_final_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager =
            DebouncedSettings::with_debounce(SettingsStore::new(path.clone()), DEFAULT_SAVE_DEBOUNCE);

        manager.update(|settings| settings.parameters.temperature = 0.1);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!path.exists());

        manager.update(|settings| settings.parameters.temperature = 0.2);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!path.exists());

        manager.update(|settings| settings.parameters.temperature = 0.3);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(path.exists());
        assert_eq!(loaded_temperature(&path), 0.3);
        assert!(!manager.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_updates_write_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager =
            DebouncedSettings::with_debounce(SettingsStore::new(path.clone()), DEFAULT_SAVE_DEBOUNCE);

        manager.update(|settings| settings.parameters.temperature = 0.1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(loaded_temperature(&path), 0.1);

        manager.update(|settings| settings.parameters.temperature = 0.2);
        assert_eq!(loaded_temperature(&path), 0.1);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(loaded_temperature(&path), 0.2);
        assert!(!manager.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_writes_immediately_and_cancels_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager =
            DebouncedSettings::with_debounce(SettingsStore::new(path.clone()), DEFAULT_SAVE_DEBOUNCE);

        manager.update(|settings| settings.parameters.temperature = 0.4);
        manager.flush().unwrap();

        assert_eq!(loaded_temperature(&path), 0.4);
        assert!(!manager.is_dirty());
        assert!(manager.save_status().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn clean_flush_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager = DebouncedSettings::with_debounce(SettingsStore::new(path.clone()), DEFAULT_SAVE_DEBOUNCE);

        manager.flush().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn no_op_update_schedules_no_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let manager = DebouncedSettings::with_debounce(SettingsStore::new(path.clone()), DEFAULT_SAVE_DEBOUNCE);

        let temperature = manager.current().parameters.temperature;
        manager.update(|settings| settings.parameters.temperature = temperature);

        assert!(!manager.is_dirty());
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_keeps_dirty_and_retries_on_the_next_flush() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let manager = DebouncedSettings::with_debounce(
            SettingsStore::new(blocker.join("settings.json")),
            DEFAULT_SAVE_DEBOUNCE,
        );

        manager.update(|settings| settings.parameters.temperature = 0.9);
        assert!(manager.flush().is_err());
        assert!(manager.is_dirty());
        assert!(
            manager
                .save_status()
                .unwrap()
                .contains("Failed to save settings")
        );
        // The live value is unaffected by persistence trouble.
        assert_eq!(manager.current().parameters.temperature, 0.9);

        // Dirty was not consumed by the failure, so the next flush attempts
        // the write again instead of treating it as done.
        assert!(manager.flush().is_err());
        assert!(manager.is_dirty());
    }
}
