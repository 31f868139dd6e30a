//! Job postings: the public board, owner management and request parsing.

pub mod handlers;
pub mod payload;
pub mod search;
