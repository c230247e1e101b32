//! API middleware.
//!
//! Request logging runs innermost so the status it records is the one the
//! handler produced.

pub mod audit;
