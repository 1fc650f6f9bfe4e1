//! # msgbridge-mime
//!
//! Text mail building blocks for msgbridge.
//!
//! ## Features
//!
//! - **Ordered headers**: Headers keep insertion order and are sanitized on insert
//! - **Transport header parsing**: Lenient parsing of folded header blocks
//! - **Rendering**: `MessageBuilder` produces a [`RenderedDocument`] whose lines
//!   are joined with CRLF only
//!
//! ## Quick Start
//!
//! ```
//! use msgbridge_mime::MessageBuilder;
//!
//! let document = MessageBuilder::new()
//!     .from(Some("sender@example.com"))
//!     .subject(Some("Test"))
//!     .text_body("Hello")
//!     .build();
//!
//! let bytes = document.to_bytes();
//! assert!(bytes.starts_with(b"From: sender@example.com\r\n"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod document;
mod header;
mod message;

pub use content_type::ContentType;
pub use document::{CRLF, RenderedDocument};
pub use header::{Headers, sanitize_value};
pub use message::{Body, MessageBuilder, TransferEncoding};
