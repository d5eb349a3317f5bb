//! Script Binding Layer
//!
//! Everything that crosses the boundary between native code and the script
//! context lives here:
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │          Native side         │        │         Script side          │
//! │                              │        │                              │
//! │  PendingCall (names)         │        │  __fbBatchedBridge           │
//! │        │ registry lookup     │        │        ▲                     │
//! │        v                     │ script │        │                     │
//! │  CallBatch (records) ────────┼──text──┼──> [[mods],[meths],[args]]   │
//! │                              │        │        │                     │
//! │  ResultDocument <────────────┼──JSON──┼── flushed queue              │
//! └──────────────────────────────┘        └──────────────────────────────┘
//! ```
//!
//! - `protocol`: the wire tuple codec and the script entry points
//! - `js`: the QuickJS executor that runs the script text

pub mod js;
pub mod protocol;

pub use js::QuickJsExecutor;
pub use protocol::*;
