//! Per-chunk save files: full compressed snapshots or differential edit
//! lists, merged on save and applied after generation on load.

pub mod codec;
pub mod error;
pub mod save_store;

pub use codec::{FORMAT_VERSION, SaveHeader, SaveMode, SaveRecord, decode, encode_differential, encode_full};
pub use error::PersistError;
pub use save_store::{LoadOutcome, SaveOutcome, SaveStore};
