//! On-disk layout shared by the encoder and the readers.
//!
//! # Module Organization
//!
//! - [`index`]: serializes and validates the block index
//!
//! # Architecture
//!
//! ```text
//! Container (two files):
//! ┌─────────────────┐      ┌─────────────────┐
//! │  .bof blob      │      │  .idx index     │ ← index::BlockIndex
//! │  block 0 ───────┼──────┼─ offset[0]      │
//! │  block 1 ───────┼──────┼─ offset[1]      │
//! │  ...            │      │  ...            │
//! │                 │      │  end, end, len  │
//! └─────────────────┘      └─────────────────┘
//!   raw DEFLATE blocks,      u32 LE entries
//!   no header
//! ```

pub mod index;
