// Library interface for lapfix modules
// This allows integration tests and benches to drive the engine directly

pub mod aggregate;
pub mod config;
pub mod edit;
pub mod error;
pub mod export;
pub mod extract;
pub mod import;
pub mod logging;
pub mod models;
pub mod plan;
pub mod selection;
pub mod synth;

// Re-export commonly used types for convenience
pub use aggregate::ActivityTotals;
pub use config::AppConfig;
pub use edit::{BulkEdit, EditSession, InclineAxis, SpeedAxis};
pub use error::{LapfixError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use plan::EditPlan;
pub use selection::LapSelection;
pub use synth::{synthesize, SynthesisOptions};
