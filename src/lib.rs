//! Call-site attribution for developer logging.
//!
//! Two halves produce the same [`SourceLocationRecord`]:
//!
//! * [`Rewriter`] runs at build time. It finds monitored calls such as
//!   `useLogger()`, `withLogger(Page)` or `logger.info("hi")` in JS/TS/JSX
//!   source and splices `{ __source: { fileName, lineNumber } }` into their
//!   arguments.
//! * [`SourceResolver`] runs when a log call arrives without an injected
//!   location. It parses the current stack, drops library and bundler frames
//!   and reports the first user frame.
//!
//! Neither half fails on odd input; the worst case is no attribution.

pub mod adapter;
pub mod args;
pub mod attribution;
pub mod callsite;
pub mod config;
pub mod error;
pub mod frame;
pub mod internal;
pub mod lexer;
pub mod path;
pub mod resolver;
pub mod rewrite;

#[cfg(target_arch = "wasm32")]
mod wasm;

use std::sync::OnceLock;

pub use adapter::{transform_module, ModuleFilter, SourcePlugin};
pub use attribution::{take_injected_source, Attributor, InjectedSource};
pub use config::{ConfigStore, LoggerOptions, MonitoredNames, TransformConfig};
pub use error::ConfigError;
pub use frame::{parse_frame, StackFrame};
pub use internal::InternalPatterns;
pub use lexer::{classify, LexState};
pub use path::{clean_path, display_path};
pub use resolver::{resolve_from_stack, Provenance, SkipFrames, SourceLocationRecord, SourceResolver, StackCapture};
pub use rewrite::{Edit, Rewriter, TransformOutput};

/// Rewriter for the default monitored names, built once.
pub fn default_rewriter() -> &'static Rewriter {
    static DEFAULT: OnceLock<Rewriter> = OnceLock::new();
    DEFAULT.get_or_init(|| Rewriter::new(TransformConfig::default()).expect("default monitored names are valid"))
}

/// Rewrite `source` with the default configuration.
pub fn transform(source: &str, path: &str) -> TransformOutput {
    default_rewriter().transform(source, path)
}
