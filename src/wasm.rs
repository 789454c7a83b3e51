//! WASM bindings for the dials engine.
//!
//! Exposes one engine instance per `DialsEngine` object to JavaScript.
//! The page side is supplied as a plain host object:
//!
//! ```js
//! {
//!   readSheets(),                // -> { sheets: [...] } snapshot, excluding #dials-overrides
//!   matchMedia(query),           // -> boolean
//!   writeStyle(css),             // replace the override element's text
//!   subscribeMedia(query, cb),   // -> handle
//!   observeRoot(attributes, cb), // -> handle; cb(attributeName)
//!   unsubscribe(handle),
//! }
//! ```
//!
//! Build with: `wasm-pack build --target web --features wasm`

use std::rc::Rc;
use std::time::Duration;

use js_sys::{Array, Function, Reflect};
use wasm_bindgen::prelude::*;

use crate::engine::{Engine, EngineConfig};
use crate::error::{DialsError, Result};
use crate::export::ExportFormat;
use crate::model::Context;
use crate::overrides::StyleSink;
use crate::resolver::Environment;
use crate::sheet::{CssRule, Snapshot, StyleSource};
use crate::watcher::{AttributeNotify, EnvironmentHost, Notify};

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

fn method(host: &JsValue, name: &str) -> std::result::Result<Function, JsError> {
    Reflect::get(host, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or_else(|| JsError::new(&format!("host object is missing `{name}()`")))
}

/// A live listener. The closure must outlive the JS-side registration.
pub struct JsSubscription {
    handle: JsValue,
    _media: Option<Closure<dyn Fn()>>,
    _attributes: Option<Closure<dyn Fn(String)>>,
}

/// [`Host`](crate::engine::Host) implementation over JS callbacks.
pub struct JsHost {
    this: JsValue,
    read_sheets: Function,
    match_media: Function,
    write_style: Function,
    subscribe_media: Function,
    observe_root: Function,
    unsubscribe: Function,
    snapshot: Snapshot,
}

impl JsHost {
    fn new(host: JsValue) -> std::result::Result<Self, JsError> {
        Ok(Self {
            read_sheets: method(&host, "readSheets")?,
            match_media: method(&host, "matchMedia")?,
            write_style: method(&host, "writeStyle")?,
            subscribe_media: method(&host, "subscribeMedia")?,
            observe_root: method(&host, "observeRoot")?,
            unsubscribe: method(&host, "unsubscribe")?,
            this: host,
            snapshot: Snapshot::default(),
        })
    }

    /// Capture the page's stylesheets into the cached snapshot.
    fn refresh(&mut self) -> Result<()> {
        let raw = self
            .read_sheets
            .call0(&self.this)
            .map_err(|e| DialsError::host(&format!("{e:?}")))?;
        self.snapshot = serde_wasm_bindgen::from_value(raw)
            .map_err(|e| DialsError::host(&e.to_string()))?;
        Ok(())
    }
}

impl StyleSource for JsHost {
    fn sheet_count(&self) -> usize {
        self.snapshot.sheet_count()
    }

    fn read_sheet(&self, index: usize) -> Result<Vec<CssRule>> {
        self.snapshot.read_sheet(index)
    }
}

impl Environment for JsHost {
    fn matches_media(&self, query: &str) -> bool {
        self.match_media
            .call1(&self.this, &JsValue::from_str(query))
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }
}

impl StyleSink for JsHost {
    fn write_style(&mut self, css: &str) {
        if let Err(e) = self.write_style.call1(&self.this, &JsValue::from_str(css)) {
            log::warn!("writeStyle failed: {e:?}");
        }
    }
}

impl EnvironmentHost for JsHost {
    type Subscription = JsSubscription;

    fn subscribe_media(&mut self, query: &str, notify: Notify) -> JsSubscription {
        let closure = Closure::<dyn Fn()>::new(move || notify());
        let handle = self
            .subscribe_media
            .call2(&self.this, &JsValue::from_str(query), closure.as_ref())
            .unwrap_or(JsValue::UNDEFINED);
        JsSubscription {
            handle,
            _media: Some(closure),
            _attributes: None,
        }
    }

    fn observe_root_attributes(
        &mut self,
        attributes: &[String],
        notify: AttributeNotify,
    ) -> JsSubscription {
        let names: Array = attributes.iter().map(|a| JsValue::from_str(a)).collect();
        let closure = Closure::<dyn Fn(String)>::new(move |name: String| notify(&name));
        let handle = self
            .observe_root
            .call2(&self.this, &names, closure.as_ref())
            .unwrap_or(JsValue::UNDEFINED);
        JsSubscription {
            handle,
            _media: None,
            _attributes: Some(closure),
        }
    }

    fn unsubscribe(&mut self, subscription: JsSubscription) {
        if let Err(e) = self.unsubscribe.call1(&self.this, &subscription.handle) {
            log::warn!("unsubscribe failed: {e:?}");
        }
    }
}

/// One engine instance bound to a page.
#[wasm_bindgen]
pub struct DialsEngine {
    engine: Engine<JsHost>,
}

#[wasm_bindgen]
impl DialsEngine {
    /// `config` is optional: `{ rescanDebounceMs, includeUniformVariables }`.
    #[wasm_bindgen(constructor)]
    pub fn new(host: JsValue, config: JsValue) -> std::result::Result<DialsEngine, JsError> {
        let config: EngineConfig = if config.is_undefined() || config.is_null() {
            EngineConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config).map_err(js_err)?
        };
        Ok(Self {
            engine: Engine::with_config(JsHost::new(host)?, config),
        })
    }

    /// Scan the page, write the override element and start watching.
    /// `on_change` fires when the active contexts may have changed.
    pub fn init(&mut self, on_change: Function) -> std::result::Result<(), JsError> {
        self.engine.host_mut().refresh().map_err(js_err)?;
        let notify: Notify = Rc::new(move || {
            let _ = on_change.call0(&JsValue::NULL);
        });
        self.engine.init(notify);
        Ok(())
    }

    /// Rescan now, keeping edits.
    pub fn detect(&mut self) -> std::result::Result<(), JsError> {
        self.engine.host_mut().refresh().map_err(js_err)?;
        self.engine.detect();
        Ok(())
    }

    /// Call from a `MutationObserver` when a style/link node is added.
    #[wasm_bindgen(js_name = noteStylesheetMutation)]
    pub fn note_stylesheet_mutation(&mut self, now_ms: f64) {
        self.engine.note_stylesheet_mutation(millis(now_ms));
    }

    /// Run a due rescan. Returns whether one ran.
    pub fn poll(&mut self, now_ms: f64) -> std::result::Result<bool, JsError> {
        if !self.engine.rescan_pending() {
            return Ok(false);
        }
        self.engine.host_mut().refresh().map_err(js_err)?;
        Ok(self.engine.poll(millis(now_ms)))
    }

    pub fn dispose(&mut self) {
        self.engine.dispose();
    }

    pub fn variables(&self) -> std::result::Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.engine.listing()).map_err(js_err)
    }

    #[wasm_bindgen(js_name = contextualVariables)]
    pub fn contextual_variables(&self) -> std::result::Result<JsValue, JsError> {
        let vars: Vec<_> = self.engine.contextual_variables().collect();
        serde_wasm_bindgen::to_value(&vars).map_err(js_err)
    }

    #[wasm_bindgen(js_name = activeContext)]
    pub fn active_context(&self, name: &str) -> std::result::Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.engine.active_context(name)).map_err(js_err)
    }

    #[wasm_bindgen(js_name = activeContextKey)]
    pub fn active_context_key(&self, name: &str) -> Option<String> {
        self.engine.active_context_key(name)
    }

    #[wasm_bindgen(js_name = isUserChanged)]
    pub fn is_user_changed(&self, name: &str) -> bool {
        self.engine.is_user_changed(name)
    }

    #[wasm_bindgen(js_name = displayedValue)]
    pub fn displayed_value(&self, name: &str) -> Option<String> {
        self.engine.store().displayed_value(name).map(str::to_string)
    }

    #[wasm_bindgen(js_name = valueFor)]
    pub fn value_for(&self, name: &str, context_key: &str) -> Option<String> {
        self.engine.store().value_for(name, context_key).map(str::to_string)
    }

    #[wasm_bindgen(js_name = setBaseValue)]
    pub fn set_base_value(&mut self, name: &str, value: &str) {
        self.engine.set_base_value(name, value);
    }

    /// Edit the context named by `context_key`, or the active one when
    /// omitted. Returns the key written, `undefined` when nothing resolved.
    #[wasm_bindgen(js_name = setContextualValue)]
    pub fn set_contextual_value(
        &mut self,
        name: &str,
        value: &str,
        context_key: Option<String>,
    ) -> Option<String> {
        self.engine
            .set_contextual_value(name, value, None, context_key.as_deref())
    }

    /// Edit an explicit context object as returned by `variables()`.
    #[wasm_bindgen(js_name = setValueInContext)]
    pub fn set_value_in_context(
        &mut self,
        name: &str,
        value: &str,
        context: JsValue,
    ) -> std::result::Result<Option<String>, JsError> {
        let context: Context = serde_wasm_bindgen::from_value(context).map_err(js_err)?;
        Ok(self
            .engine
            .set_contextual_value(name, value, Some(&context), None))
    }

    #[wasm_bindgen(js_name = resetOne)]
    pub fn reset_one(&mut self, name: &str) -> bool {
        self.engine.reset_one(name)
    }

    #[wasm_bindgen(js_name = resetAll)]
    pub fn reset_all(&mut self) {
        self.engine.reset_all();
    }

    #[wasm_bindgen(js_name = changedEntries)]
    pub fn changed_entries(&self) -> std::result::Result<JsValue, JsError> {
        serde_wasm_bindgen::to_value(&self.engine.changed_entries()).map_err(js_err)
    }

    #[wasm_bindgen(js_name = exportCss)]
    pub fn export_css(&self) -> String {
        self.engine.export(ExportFormat::Css)
    }

    #[wasm_bindgen(js_name = exportJson)]
    pub fn export_json(&self) -> String {
        self.engine.export(ExportFormat::Json)
    }

    #[wasm_bindgen(js_name = overrideCss)]
    pub fn override_css(&self) -> String {
        self.engine.override_css().to_string()
    }
}

/// Classify a value as `color`, `number` or `other`.
#[wasm_bindgen(js_name = variableKind)]
pub fn variable_kind(value: &str) -> std::result::Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(&crate::value::variable_kind(value)).map_err(js_err)
}

fn millis(ms: f64) -> Duration {
    Duration::from_millis(ms.max(0.0) as u64)
}
