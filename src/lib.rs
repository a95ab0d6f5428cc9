//! Timesheet Agent - foreground-window activity tracker.
//!
//! The agent polls the title of the focused window on a fixed cadence,
//! splits the timeline into segments wherever the title changes, asks a
//! local inference service to label each finished segment as study, work
//! or break, and appends the result to a SQLite timesheet.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Timesheet Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐    │
//! │  │   Window    │──▶│   Tracker   │──▶│  Finalize queue  │    │
//! │  │   Source    │   │ (3s polls)  │   │  (worker thread) │    │
//! │  └─────────────┘   └─────────────┘   └──────────────────┘    │
//! │                                          │          │        │
//! │                                          ▼          ▼        │
//! │                                   ┌──────────┐ ┌──────────┐  │
//! │                                   │Classifier│ │  SQLite  │  │
//! │                                   │ (Ollama) │ │  store   │  │
//! │                                   └──────────┘ └──────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use timesheet_agent::{
//!     classifier::{BlockingClassifier, ClassifierConfig},
//!     core::{Agent, AgentOptions, Finalizer, InlineSink, SystemClock},
//!     store::SqliteStore,
//!     transparency::create_shared_log,
//!     window,
//! };
//!
//! let log = create_shared_log();
//! let classifier = BlockingClassifier::new(ClassifierConfig::default()).unwrap();
//! let store = SqliteStore::open("timesheet.db".as_ref()).unwrap();
//! let sink = InlineSink::new(Finalizer::new(classifier, store, log.clone()));
//!
//! let running = AtomicBool::new(true);
//! let mut agent = Agent::new(
//!     window::foreground_window(),
//!     SystemClock,
//!     sink,
//!     AgentOptions::default(),
//!     log,
//! );
//! agent.run(&running).unwrap();
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod store;
pub mod transparency;
pub mod window;

// Re-export key types at crate root for convenience
pub use classifier::{BlockingClassifier, Category, Classifier, ClassifierConfig};
pub use config::{Config, ConfigError};
pub use core::{
    ActivitySegment, ActivityTracker, Agent, AgentError, AgentOptions, ClosedSegment, RunSummary,
};
pub use store::{RecordId, RecordStore, SqliteStore, StoreError, StoredRecord};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};
pub use window::{ForegroundWindow, WindowSource};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the agent records, shown by `timesheet-agent privacy`.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║              TIMESHEET AGENT - WHAT IS RECORDED                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  ✓ RECORDED:                                                     ║
║    • The title of the focused window, when it changes            ║
║    • When each title started and stopped being focused           ║
║    • A category (study, work, break) for each period             ║
║                                                                  ║
║  ✗ NEVER RECORDED:                                               ║
║    • Keystrokes or window contents                               ║
║    • Screenshots                                                 ║
║    • Activity while the agent is not running                     ║
║                                                                  ║
║  Titles are sent only to the classification endpoint you         ║
║  configure (a local model by default) and stored in a local      ║
║  SQLite file.                                                    ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
