//! JS-facing exports for bundler plugins running the crate as wasm.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Object, Reflect};
use wasm_bindgen::prelude::*;

use crate::adapter::SourcePlugin;
use crate::resolver::{SkipFrames, SourceResolver};
use crate::rewrite::TransformOutput;

thread_local! {
    // Last plugin built, keyed by the raw config it came from.
    static PLUGIN: RefCell<Option<(Option<String>, Rc<SourcePlugin>)>> = const { RefCell::new(None) };
    static RESOLVER: SourceResolver = SourceResolver::default();
}

fn plugin_for(config_json: Option<String>) -> Rc<SourcePlugin> {
    PLUGIN.with(|cell| {
        let mut cached = cell.borrow_mut();
        if let Some((key, plugin)) = cached.as_ref() {
            if *key == config_json {
                return Rc::clone(plugin);
            }
        }
        let plugin = Rc::new(SourcePlugin::from_plugin_config(config_json.as_deref()));
        *cached = Some((config_json, Rc::clone(&plugin)));
        plugin
    })
}

/// `transform(code, id, configJson?)` returns `{ code, changed }`, or
/// `undefined` when the module is left untouched.
#[wasm_bindgen]
pub fn transform(code: &str, id: &str, config_json: Option<String>) -> JsValue {
    let Some(output) = plugin_for(config_json).transform_module(code, id) else {
        return JsValue::UNDEFINED;
    };
    match output_object(&output) {
        Ok(obj) => obj.into(),
        Err(e) => {
            log::debug!("{id}: could not build transform result: {e:?}");
            JsValue::UNDEFINED
        }
    }
}

fn output_object(output: &TransformOutput) -> Result<Object, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &JsValue::from_str("code"), &JsValue::from_str(&output.text))?;
    Reflect::set(&obj, &JsValue::from_str("changed"), &JsValue::from_bool(output.changed))?;
    Ok(obj)
}

/// Resolve the caller's location from the current JS stack, as JSON.
#[wasm_bindgen(js_name = resolveSource)]
pub fn resolve_source(skip: usize) -> String {
    let record = RESOLVER.with(|resolver| resolver.resolve(SkipFrames(skip)));
    serde_json::to_string(&record).unwrap_or("{}".into())
}
