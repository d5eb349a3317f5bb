//! # Script Bridge
//!
//! A bridge between a JavaScript application running in an embedded script
//! executor and a native host.
//!
//! ## Features
//!
//! - **Module Registry**: native modules and their methods addressed by stable integer IDs
//! - **Call Protocol**: batches travel as `[[moduleIds], [methodIds], [argLists]]`
//! - **Outbound Queue**: calls buffered until the bridge is ready, flushed in enqueue order
//! - **Promise Correlation**: callback codes resolved at most once
//! - **Lifecycle**: `Uninitialized → Initializing → LoadingSource → Ready`, with reload and failure
//!
//! ### Example
//!
//! ```ignore
//! use script_bridge::bridge::{Bridge, HeadlessUiManager};
//! use script_bridge::config::BridgeConfig;
//!
//! let mut bridge = Bridge::new(BridgeConfig::default());
//! bridge.set_executor_name("quickjs");
//! bridge.set_ui_manager(Box::new(HeadlessUiManager));
//! bridge.init()?;
//! bridge.load_bundle("file:///srv/app/index.bundle.js")?;
//! bridge.enqueue_js_call("Timing", "createTimer", vec![1.into(), 1000.into(), true.into()]);
//! bridge.pump();
//! ```
//!
//! ## Modules
//!
//! - [`core`]: errors, diagnostics, logging
//! - [`config`]: configuration files and environment overrides
//! - [`modules`]: native module registry
//! - [`bindings`]: wire protocol and the QuickJS executor
//! - [`scripting`]: executor trait and factory
//! - [`dispatch`]: events and promise correlation
//! - [`bridge`]: the orchestrator

/// Errors, diagnostics, logging and shared helpers
pub mod core;
/// Configuration system
pub mod config;
/// Native module registry
pub mod modules;
/// Wire protocol and script bindings
pub mod bindings;
/// Script executors
pub mod scripting;
/// Event and promise dispatch
pub mod dispatch;
/// Bridge core and lifecycle
pub mod bridge;

pub use bridge::{Bridge, BridgeHandle, BridgeNotification, BridgeState};
pub use config::BridgeConfig;
pub use core::{BridgeError, BridgeResult};
