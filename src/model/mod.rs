//! Core data model: MIME part trees, messages, extracted bodies and labels.

pub mod label;
pub mod mail;
pub mod part;
