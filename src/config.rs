//! Configuration: which names the rewriter watches, and the runtime options
//! the logger consults before resolving a location.
//!
//! Build-time options are read once per plugin instance and are immutable
//! afterwards. Runtime options live in a [`ConfigStore`] handle that is passed
//! to whoever needs it; there is no process-wide singleton.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::callsite::is_ident_byte;
use crate::error::ConfigError;

// -----------------------------------------------------------------------------
// Monitored names
// -----------------------------------------------------------------------------

/// The identifiers eligible for source-location injection.
///
/// `hooks`, `wrappers` and `receivers` must be disjoint. Logger-like calls are
/// any `receiver.method(…)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoredNames {
    pub hooks: Vec<String>,
    pub wrappers: Vec<String>,
    pub receivers: Vec<String>,
    pub methods: Vec<String>,
}

impl Default for MonitoredNames {
    fn default() -> Self {
        fn owned(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }
        Self {
            hooks: owned(&["useLogger", "useLog"]),
            wrappers: owned(&["withLogger"]),
            receivers: owned(&["logger", "log"]),
            methods: owned(&["trace", "debug", "info", "warn", "error", "fatal"]),
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes.first() {
        Some(first) if !first.is_ascii_digit() => bytes.iter().all(|b| is_ident_byte(*b)),
        _ => false,
    }
}

impl MonitoredNames {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let groups: [(&'static str, &Vec<String>); 3] = [
            ("hooks", &self.hooks),
            ("wrappers", &self.wrappers),
            ("receivers", &self.receivers),
        ];

        for name in groups.iter().flat_map(|(_, names)| names.iter()).chain(&self.methods) {
            if !is_identifier(name) {
                return Err(ConfigError::InvalidName(name.clone()));
            }
        }

        for (i, (first, a)) in groups.iter().enumerate() {
            for (second, b) in groups.iter().skip(i + 1) {
                if let Some(name) = a.iter().find(|n| b.contains(*n)) {
                    return Err(ConfigError::OverlappingName {
                        name: name.clone(),
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }

    /// Substrings whose absence lets a file skip scanning entirely.
    pub(crate) fn needles(&self) -> impl Iterator<Item = &str> {
        let receivers = if self.methods.is_empty() {
            &self.receivers[..0]
        } else {
            &self.receivers[..]
        };
        self.hooks
            .iter()
            .chain(&self.wrappers)
            .chain(receivers)
            .map(String::as_str)
    }
}

// -----------------------------------------------------------------------------
// Build-time options
// -----------------------------------------------------------------------------

fn default_pad_argument() -> String {
    "undefined".to_string()
}

/// Options handed to the rewriter by a build-tool integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformConfig {
    pub monitored: MonitoredNames,
    /// Literal used to pad logger calls up to the `(message, data, context)` shape.
    pub pad_argument: String,
    /// Extra path fragments that identify the logging library's own files.
    pub library_markers: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            monitored: MonitoredNames::default(),
            pad_argument: default_pad_argument(),
            library_markers: Vec::new(),
        }
    }
}

impl TransformConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.monitored.validate()?;
        Ok(config)
    }

    /// Lenient loading for plugin hosts: a missing or broken config falls back
    /// to the defaults instead of failing the build.
    pub fn from_plugin_config(json: Option<&str>) -> Self {
        match json.map(Self::from_json) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                log::warn!("ignoring plugin config, using defaults: {e}");
                Self::default()
            }
            None => Self::default(),
        }
    }
}

// -----------------------------------------------------------------------------
// Runtime options
// -----------------------------------------------------------------------------

/// Options the runtime side reads on every log call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerOptions {
    /// Master switch for attaching any location.
    pub enabled: bool,
    /// Fall back to stack resolution when no injected location is present.
    pub source_tracking: bool,
    /// Wrapper layers the application adds around the public logging calls.
    pub extra_skip_frames: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            source_tracking: true,
            extra_skip_frames: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&LoggerOptions) + Send + Sync>;

/// Shared handle to the runtime options with explicit change notification.
pub struct ConfigStore {
    options: RwLock<LoggerOptions>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(LoggerOptions::default())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("options", &*self.options.read())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl ConfigStore {
    pub fn new(options: LoggerOptions) -> Self {
        Self {
            options: RwLock::new(options),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> LoggerOptions {
        self.options.read().clone()
    }

    pub fn configure(&self, update: impl FnOnce(&mut LoggerOptions)) {
        let current = {
            let mut options = self.options.write();
            update(&mut *options);
            options.clone()
        };
        self.notify(&current);
    }

    /// Replace the options with a JSON document; omitted fields take defaults.
    pub fn configure_json(&self, json: &str) -> Result<(), ConfigError> {
        let parsed: LoggerOptions = serde_json::from_str(json)?;
        self.configure(|options| *options = parsed);
        Ok(())
    }

    pub fn reset(&self) {
        self.configure(|options| *options = LoggerOptions::default());
    }

    pub fn subscribe(&self, subscriber: impl Fn(&LoggerOptions) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(subscriber)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn notify(&self, options: &LoggerOptions) {
        // Call outside the lock so a subscriber may read or reconfigure the store.
        let subscribers: Vec<Subscriber> =
            self.subscribers.lock().iter().map(|(_, s)| Arc::clone(s)).collect();
        for subscriber in subscribers {
            subscriber(options);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn defaults_validate() {
        MonitoredNames::default().validate().unwrap();
    }

    #[test]
    fn rejects_overlapping_groups() {
        let names = MonitoredNames {
            hooks: vec!["useLogger".into()],
            wrappers: vec!["useLogger".into()],
            ..Default::default()
        };
        match names.validate() {
            Err(ConfigError::OverlappingName { name, first, second }) => {
                assert_eq!(name, "useLogger");
                assert_eq!(first, "hooks");
                assert_eq!(second, "wrappers");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_non_identifiers() {
        let names = MonitoredNames {
            methods: vec!["info(".into()],
            ..Default::default()
        };
        assert!(matches!(names.validate(), Err(ConfigError::InvalidName(n)) if n == "info("));

        let names = MonitoredNames {
            hooks: vec!["".into()],
            ..Default::default()
        };
        assert!(matches!(names.validate(), Err(ConfigError::InvalidName(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = TransformConfig::from_json(r#"{"monitored": {"hooks": ["useTrace"]}}"#).unwrap();
        assert_eq!(config.monitored.hooks, vec!["useTrace"]);
        assert_eq!(config.monitored.wrappers, vec!["withLogger"]);
        assert_eq!(config.pad_argument, "undefined");
    }

    #[test]
    fn plugin_config_falls_back_on_error() {
        assert_eq!(TransformConfig::from_plugin_config(Some("{not json")), TransformConfig::default());
        assert_eq!(TransformConfig::from_plugin_config(None), TransformConfig::default());
        assert!(TransformConfig::from_json(r#"{"monitored": {"receivers": ["useLogger"]}}"#).is_err());
    }

    #[test]
    fn store_notifies_subscribers() {
        let store = ConfigStore::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = store.subscribe(move |opts| {
            assert!(!opts.source_tracking);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        store.configure(|o| o.source_tracking = false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!store.snapshot().source_tracking);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.reset();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot(), LoggerOptions::default());
    }

    #[test]
    fn subscriber_may_read_store() {
        let store = Arc::new(ConfigStore::default());
        let inner = Arc::clone(&store);
        store.subscribe(move |_| {
            let _ = inner.snapshot();
        });
        store.configure(|o| o.extra_skip_frames = 2);
        assert_eq!(store.snapshot().extra_skip_frames, 2);
    }

    #[test]
    fn configure_json_replaces_options() {
        let store = ConfigStore::default();
        store.configure(|o| o.extra_skip_frames = 3);
        store.configure_json(r#"{"enabled": false}"#).unwrap();
        let opts = store.snapshot();
        assert!(!opts.enabled);
        assert_eq!(opts.extra_skip_frames, 0);
        assert!(store.configure_json("[]").is_err());
    }
}
