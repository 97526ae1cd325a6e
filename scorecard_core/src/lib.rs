//! Turns loosely structured provider spreadsheets into a canonical table, and
//! computes scores, rankings and group aggregates over it.
//!
//! The crate does no I/O: readers hand it a [`RawTable`], and the results are
//! plain values for a display layer to render. See the [`manual`] module for
//! the long-form documentation.

mod config;
pub mod builder;
pub mod cache;
pub mod filter;
pub mod manual;
pub mod resolver;
pub mod scoring;
pub mod views;

pub use crate::config::*;
