//! textlayer: HTTP service that adds a searchable OCR text layer to
//! uploaded PDFs by orchestrating the external OCRmyPDF toolchain.

pub mod api;
pub mod config;
pub mod error;
pub mod invoker;
pub mod validate;
pub mod workspace;
