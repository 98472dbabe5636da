//! Message sources and the extraction stages: transfer decoding, text
//! normalization, link analysis and MIME tree reduction.

pub mod decode;
pub mod eml;
pub mod gmail;
pub mod links;
pub mod mime;
pub mod normalize;
pub mod tokens;
