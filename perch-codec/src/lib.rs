//! Byte-level codecs for the perch bot client.
//!
//! This crate handles:
//! * Framing of a single top-level JSON object out of a raw HTTP response
//!   stream that carries no usable length header ([`framer`])
//! * Decoding of `\uXXXX` escape runs, including UTF-16 surrogate pairs,
//!   into UTF-8 ([`unicode`])
//!
//! It is intentionally I/O-agnostic: the framer is a push-style state
//! machine, so any blocking or async byte source can drive it.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod framer;
pub mod unicode;

pub use framer::{Feed, FrameError, JsonFramer, frame_reader};
