//! # airwave-observability
//!
//! Structured Logging via tracing-subscriber (Text oder JSON). Die
//! Komponenten loggen in ihren eigenen Spans, das Setup hier legt nur
//! Filter und Format fest.

pub mod logging;

pub use logging::{
    log_format_gueltig, log_level_gueltig, logging_initialisieren, LogFormat, LoggingError,
};
