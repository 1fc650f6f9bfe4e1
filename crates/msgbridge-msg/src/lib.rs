//! # msgbridge-msg
//!
//! Validation and parsing of Outlook MSG containers.
//!
//! An MSG file is a compound document (the OLE2 structured storage format)
//! whose streams hold MAPI properties. This crate reads the container
//! without any native dependency and extracts the fields needed to render
//! a text mail.
//!
//! ## Features
//!
//! - **Validation**: [`FormatValidator`] runs cheap structural checks first
//! - **Compound documents**: read-only access to storages and streams in [`cfb`]
//! - **Properties**: Unicode and 8-bit strings, binary, integer and time values
//! - **Messages**: [`MessageParser`] produces a [`ParsedMessage`] with every
//!   field optional
//!
//! ## Quick Start
//!
//! ```
//! use msgbridge_msg::{Error, MessageParser, ValidationError};
//!
//! let err = MessageParser::default().parse(&[0x41; 50]).unwrap_err();
//! assert!(matches!(err, Error::Validation(ValidationError::SignatureMismatch)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cfb;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fixture;
mod message;
pub mod property;
mod validate;

pub use error::{Error, ParseError, Result, ValidationError};
pub use message::{MessageParser, ParsedMessage};
pub use validate::{DEFAULT_MAX_FILE_SIZE_MB, FormatValidator, SIGNATURE};
