//! Runtime side of the `__source` contract.
//!
//! The rewriter puts `{ __source: { fileName, lineNumber } }` into the
//! arguments of monitored calls. Whatever receives those arguments hands the
//! object here; the reserved key is removed so it never reaches formatters or
//! transports, and the location it carried becomes the log record's source.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ConfigStore;
use crate::resolver::{Provenance, SkipFrames, SourceLocationRecord, SourceResolver};

/// Reserved key the rewriter injects.
pub const SOURCE_KEY: &str = "__source";

/// The injected object, exactly as the rewriter writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedSource {
    pub file_name: String,
    pub line_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
}

impl From<InjectedSource> for SourceLocationRecord {
    fn from(source: InjectedSource) -> Self {
        SourceLocationRecord {
            file_path: Some(source.file_name.clone()),
            file_name: Some(source.file_name),
            line_number: Some(source.line_number),
            column_number: source.column_number,
            function_name: None,
            component_name: None,
            provenance: Provenance::Injected,
        }
    }
}

/// Remove `__source` from `context` and decode it.
///
/// The key is removed even when its value is malformed.
pub fn take_injected_source(context: &mut Map<String, Value>) -> Option<InjectedSource> {
    let value = context.remove(SOURCE_KEY)?;
    match serde_json::from_value(value) {
        Ok(source) => Some(source),
        Err(e) => {
            log::debug!("dropping malformed {SOURCE_KEY}: {e}");
            None
        }
    }
}

/// Decides the location attached to a log call.
#[derive(Debug)]
pub struct Attributor {
    resolver: SourceResolver,
    options: Arc<ConfigStore>,
}

impl Attributor {
    pub fn new(resolver: SourceResolver, options: Arc<ConfigStore>) -> Self {
        Self { resolver, options }
    }

    pub fn options(&self) -> &Arc<ConfigStore> {
        &self.options
    }

    /// Injected location first; stack resolution only when none was injected
    /// and source tracking is on. `skip` counts the caller's own wrapper
    /// layers; configured extra layers are added on top.
    pub fn attribute(&self, context: &mut Map<String, Value>, skip: SkipFrames) -> Option<SourceLocationRecord> {
        let injected = take_injected_source(context);
        let options = self.options.snapshot();
        if !options.enabled {
            return None;
        }
        if let Some(source) = injected {
            return Some(source.into());
        }
        if !options.source_tracking {
            return None;
        }
        let record = self.resolver.resolve(skip.plus(options.extra_skip_frames));
        (!record.is_unresolved()).then_some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::InternalPatterns;
    use crate::resolver::StackCapture;
    use serde_json::json;

    struct Fixed(&'static str);

    impl StackCapture for Fixed {
        fn capture(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    const STACK: &str = "Error\n    at helper (src/lib/log.ts:3:1)\n    at Checkout (src/app/checkout.tsx:40:7)\n";

    fn attributor() -> Attributor {
        Attributor::new(
            SourceResolver::with_capture(InternalPatterns::default(), Box::new(Fixed(STACK))),
            Arc::new(ConfigStore::default()),
        )
    }

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn takes_and_removes_injected_source() {
        let mut ctx = context(json!({ "userId": 7, "__source": { "fileName": "app/page", "lineNumber": 5 } }));
        let source = take_injected_source(&mut ctx).unwrap();
        assert_eq!(source.file_name, "app/page");
        assert_eq!(source.line_number, 5);
        assert_eq!(source.column_number, None);
        assert!(!ctx.contains_key(SOURCE_KEY));
        assert!(ctx.contains_key("userId"));
    }

    #[test]
    fn malformed_source_is_still_removed() {
        let mut ctx = context(json!({ "__source": "app/page" }));
        assert_eq!(take_injected_source(&mut ctx), None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn injected_wins_over_resolved() {
        let mut ctx = context(json!({ "__source": { "fileName": "app/page", "lineNumber": 5, "columnNumber": 3 } }));
        let rec = attributor().attribute(&mut ctx, SkipFrames::DIRECT).unwrap();
        assert_eq!(rec.provenance, Provenance::Injected);
        assert_eq!(rec.file_name.as_deref(), Some("app/page"));
        assert_eq!(rec.column_number, Some(3));
    }

    #[test]
    fn resolves_when_nothing_was_injected() {
        let a = attributor();
        let rec = a.attribute(&mut Map::new(), SkipFrames::DIRECT).unwrap();
        assert_eq!(rec.provenance, Provenance::Resolved);
        assert_eq!(rec.file_path.as_deref(), Some("src/lib/log.ts"));

        a.options().configure(|o| o.extra_skip_frames = 1);
        let rec = a.attribute(&mut Map::new(), SkipFrames::DIRECT).unwrap();
        assert_eq!(rec.file_path.as_deref(), Some("src/app/checkout.tsx"));
        assert_eq!(rec.line_number, Some(40));
    }

    #[test]
    fn switches_are_honoured() {
        let a = attributor();
        a.options().configure(|o| o.source_tracking = false);
        assert_eq!(a.attribute(&mut Map::new(), SkipFrames::DIRECT), None);

        let mut ctx = context(json!({ "__source": { "fileName": "app/page", "lineNumber": 5 } }));
        assert!(a.attribute(&mut ctx, SkipFrames::DIRECT).is_some());

        a.options().configure(|o| o.enabled = false);
        let mut ctx = context(json!({ "__source": { "fileName": "app/page", "lineNumber": 5 } }));
        assert_eq!(a.attribute(&mut ctx, SkipFrames::DIRECT), None);
        assert!(ctx.is_empty());
    }
}
