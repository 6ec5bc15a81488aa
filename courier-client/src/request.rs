//! Request-side types.
//!
//! - [`RequestBody`]: The payload of a request
//! - `encoder`: Turns a merged [`RequestConfig`](crate::RequestConfig) into
//!   the parts sent on the wire

mod body;
mod encoder;

pub use body::RequestBody;
pub(crate) use encoder::{PreparedRequest, prepare};
