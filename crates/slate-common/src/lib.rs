//! Shared types for the Slate analyzer.
//!
//! Provides the primitives every other crate builds on: [`Span`] for byte
//! ranges in source text and [`FileId`] for identifying parsed files within
//! an analysis session.

mod span;

pub use span::{FileId, Span};
