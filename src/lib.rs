#![deny(warnings, rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Sample counts arrive as f64 on the text format
    clippy::cast_sign_loss,           // Same: counts are non-negative by contract
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. SinkError in sink module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod domain;
pub mod exposition;
pub mod sink;
pub mod source;
pub mod transfer;
pub mod transport;

// Re-export main types for easy access
pub use app::{App, Config};
pub use transfer::{Transfer, TransferConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User agent sent with every scrape, push and delete request.
pub fn user_agent() -> String {
    format!("exporter-gateway/{VERSION}")
}
