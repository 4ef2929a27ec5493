//! Core types, trait definitions and the school-year archiver for Gatelog,
//! the school gate attendance platform.
//!
//! This crate is deliberately free of database dependencies. Storage
//! backends implement [`store::AttendanceStore`]; everything that decides
//! *what* to archive and *where* lives here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod archive_table;
pub mod archiver;
pub mod attendance;
pub mod error;
pub mod scan;
pub mod school;
pub mod school_year;
pub mod store;

pub use error::{ArchiveError, Error, Result};
