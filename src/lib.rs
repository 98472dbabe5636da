//! `mailsift`: reduce raw email to bounded plain-text documents and sort
//! them into user-defined labels.
//!
//! Messages come from a source adapter ([`parser::eml`], [`parser::gmail`]),
//! are reduced by [`parser::mime::Reducer`] under a token budget, rendered
//! by [`document::render`] and resolved to one label by
//! [`classify::Classifier`]. [`pipeline`] runs batches with a caller-owned
//! cache and applies the decisions through a label sink.

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;
pub mod pipeline;
