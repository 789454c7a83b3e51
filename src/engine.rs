//! The engine: one explicitly constructed instance owning its model, edit
//! layers, override sheet and subscriptions.
//!
//! Every mutation regenerates the override sheet before returning, so the
//! page and the store are never observably out of sync.

use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::export::{self, ExportFormat};
use crate::model::{Context, ContextualVariable, VariableSet};
use crate::overrides::{self, StyleSink};
use crate::resolver::{self, Environment};
use crate::scanner::ScanStats;
use crate::sheet::StyleSource;
use crate::store::{ChangeGroup, EditStore};
use crate::watcher::{EnvironmentHost, Notify, RuntimeWatcher, WatchTargets};

/// Everything the engine needs from the page.
pub trait Host: StyleSource + Environment + StyleSink + EnvironmentHost {}

impl<T: StyleSource + Environment + StyleSink + EnvironmentHost> Host for T {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Quiet period after a stylesheet mutation before rescanning.
    pub rescan_debounce_ms: u64,
    /// Whether [`Engine::listing`] includes variables with a single value.
    pub include_uniform_variables: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rescan_debounce_ms: 100,
            include_uniform_variables: true,
        }
    }
}

impl EngineConfig {
    pub fn rescan_debounce(&self) -> Duration {
        Duration::from_millis(self.rescan_debounce_ms)
    }
}

pub struct Engine<H: Host> {
    host: H,
    config: EngineConfig,
    store: EditStore,
    watcher: RuntimeWatcher<H::Subscription>,
    on_change: Option<Notify>,
    /// Deadline of a pending debounced rescan, on the host's clock.
    rescan_at: Option<Duration>,
    override_css: String,
    initialized: bool,
}

impl<H: Host> Engine<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    pub fn with_config(host: H, config: EngineConfig) -> Self {
        Self {
            host,
            config,
            store: EditStore::new(),
            watcher: RuntimeWatcher::new(),
            on_change: None,
            rescan_at: None,
            override_css: String::new(),
            initialized: false,
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// First detection pass, initial override write, and subscriptions.
    ///
    /// `on_change` fires whenever the active context set may have changed
    /// and after every debounced rescan.
    pub fn init(&mut self, on_change: Notify) -> ScanStats {
        if self.initialized {
            self.dispose();
        }
        self.on_change = Some(on_change);
        self.initialized = true;
        let stats = self.detect();
        info!("engine initialised with {} variables", self.store.model().len());
        stats
    }

    /// Rebuild the model from the host's current stylesheets.
    ///
    /// Edits survive; originals are re-captured from the new model.
    pub fn detect(&mut self) -> ScanStats {
        let (model, stats) = VariableSet::detect(&self.host);
        self.store.set_original_values(model.original_values());
        self.store.set_model(model);
        self.rescan_at = None;

        if self.initialized {
            let targets = WatchTargets::from_model(self.store.model());
            if &targets != self.watcher.targets() || self.watcher.subscription_count() == 0 {
                if let Some(notify) = self.on_change.clone() {
                    self.watcher.start(&mut self.host, targets, notify);
                }
            }
        }
        self.flush();
        stats
    }

    /// Release all subscriptions and empty the override sheet.
    pub fn dispose(&mut self) {
        if !self.initialized {
            return;
        }
        self.watcher.stop(&mut self.host);
        self.host.write_style("");
        self.override_css.clear();
        self.on_change = None;
        self.rescan_at = None;
        self.initialized = false;
        debug!("engine disposed");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// A `<style>`/`<link>` node was added; rescan once things settle.
    pub fn note_stylesheet_mutation(&mut self, now: Duration) {
        self.rescan_at = Some(now + self.config.rescan_debounce());
    }

    /// Run a pending rescan whose quiet period has elapsed.
    pub fn poll(&mut self, now: Duration) -> bool {
        match self.rescan_at {
            Some(deadline) if now >= deadline => {
                self.detect();
                if let Some(notify) = &self.on_change {
                    notify();
                }
                true
            }
            _ => false,
        }
    }

    pub fn rescan_pending(&self) -> bool {
        self.rescan_at.is_some()
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn store(&self) -> &EditStore {
        &self.store
    }

    pub fn variables(&self) -> impl Iterator<Item = &ContextualVariable> {
        self.store.model().all()
    }

    pub fn contextual_variables(&self) -> impl Iterator<Item = &ContextualVariable> {
        self.store.model().contextual()
    }

    /// Variables for an editor list, filtered per [`EngineConfig`].
    pub fn listing(&self) -> Vec<&ContextualVariable> {
        if self.config.include_uniform_variables {
            self.variables().collect()
        } else {
            self.contextual_variables().collect()
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn variable(&self, name: &str) -> Option<&ContextualVariable> {
        self.store.variable(name)
    }

    pub fn is_user_changed(&self, name: &str) -> bool {
        self.store.is_user_changed(name)
    }

    pub fn active_context(&self, name: &str) -> Option<&Context> {
        resolver::active_context(self.store.variable(name)?, &self.host)
    }

    pub fn active_context_key(&self, name: &str) -> Option<String> {
        self.store.active_context_key(name, &self.host)
    }

    pub fn changed_entries(&self) -> Vec<ChangeGroup> {
        self.store.changed_entries()
    }

    pub fn export(&self, format: ExportFormat) -> String {
        export::export(&self.store.changed_entries(), format)
    }

    /// CSS last written to the override sheet.
    pub fn override_css(&self) -> &str {
        &self.override_css
    }

    // ── Mutations ──────────────────────────────────────────────────────

    pub fn set_base_value(&mut self, name: &str, value: &str) {
        self.store.set_base_value(name, value);
        self.flush();
    }

    pub fn set_contextual_value(
        &mut self,
        name: &str,
        value: &str,
        explicit: Option<&Context>,
        key_override: Option<&str>,
    ) -> Option<String> {
        let key = self
            .store
            .set_contextual_value(name, value, explicit, key_override, &self.host)?;
        self.flush();
        Some(key)
    }

    pub fn reset_one(&mut self, name: &str) -> bool {
        let changed = self.store.reset_one(name);
        if changed {
            self.flush();
        }
        changed
    }

    pub fn reset_all(&mut self) {
        self.store.reset_all();
        self.flush();
    }

    fn flush(&mut self) {
        self.override_css = overrides::sync(&self.store, &mut self.host);
    }
}

impl<H: Host> Drop for Engine<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
