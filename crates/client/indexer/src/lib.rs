//! Materializes the native chain into the canonical store.
//!
//! [`Indexer`] follows a [`BlockSource`], decodes each native block into a canonical
//! [`BlockBundle`](ep_block::BlockBundle) with [`BlockDecoder`], and commits it. It is the only writer of the store.

pub mod decode;
mod pipeline;
mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use decode::{BlockDecoder, DecodeError, DecoderConfig};
pub use pipeline::*;
pub use source::*;
