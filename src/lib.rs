//! Format, tokenize and pack instruction datasets into fixed-length
//! causal-LM training blocks.
//!
//! The core is [`data::packer::SequencePacker`]: it cuts column
//! batches of token ids into blocks of exactly `block_length` tokens,
//! carrying leftovers between calls in a caller-owned
//! [`data::packer::PackerState`].

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
