//! Turn a page's title and URL into copy-ready text: built-in presets plus
//! user-defined formats with placeholders, search/replace and a small
//! sandboxed expression language.

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod presets;
pub mod runner;
pub mod substitute;
pub mod types;
pub mod util;

pub use config::{EngineConfig, JsonFileStore, MemoryStore, Settings, SettingsStore};
pub use error::{EvalError, PatternError, PresetError, SettingsError};
pub use format::expand;
pub use pipeline::{format_page, Diagnostic, Formatted, Formatter};
pub use presets::{Preset, PresetRegistry};
pub use runner::{evaluate, evaluate_with, EvaluationContext, Value};
pub use substitute::{substitute, substitute_or_mark};
pub use types::{FormatSpec, PageContext};
