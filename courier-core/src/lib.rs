//! Core request primitives for courier.
//!
//! This crate provides the synchronous, transport-independent pieces used by
//! the `courier-client` dispatch pipeline.
//!
//! ## Modules
//!
//! - [`canonical`]: Key-order independent JSON encoding (cache key identity)
//! - [`url`]: Base/path joining and query-string composition
//! - [`event`]: Line-buffered decoding of SSE and NDJSON event streams

pub mod canonical;
pub mod event;
pub mod url;

pub use canonical::{canonical_json, write_canonical};
pub use event::{DATA_PREFIX, DONE_SENTINEL, Frame, LineDecoder, decode_line};
pub use url::{append_query, encode_query, is_absolute, join_url};
