//! Applied state: the persisted record of what exists externally.
//!
//! # Storage Layout
//!
//! ```text
//! <state_dir>/
//! └── <stack name>.json
//! ```
//!
//! # Example State File
//!
//! ```json
//! {
//!   "version": 1,
//!   "stack": "notifier",
//!   "resources": {
//!     "state": {
//!       "kind": "bucket",
//!       "external_id": "bucket-state-3f2a9c1d",
//!       "last_applied_properties": {},
//!       "last_resolved_properties": {},
//!       "attributes": { "arn": "arn:local:bucket:::state", "name": "state" },
//!       "depends_on": []
//!     }
//!   }
//! }
//! ```

mod storage;
mod types;

pub use storage::*;
pub use types::*;
