//! # msgbridge-core
//!
//! Conversion pipeline for msgbridge.
//!
//! This crate provides:
//! - Configuration layered from defaults, a JSON file and the environment
//! - `MessageConverter`: validation, parsing and rendering of MSG input
//! - `PipelineController`: deadline-bounded sequencing and routing of items
//! - `StorageGateway` with filesystem and in-memory backends
//! - Conversion log sinks and per-item reports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod convert;
mod error;
pub mod log;
pub mod pipeline;
pub mod storage;

pub use config::{Config, Containers};
pub use convert::{Converted, MessageConverter, render};
pub use error::{ConversionError, Error, PipelineError, Result, StorageError};
pub use log::{ConversionLog, MemoryLog, TracingLog};
pub use pipeline::{
    ConversionOutcome, ConversionReport, InboundItem, PipelineController, QuarantineOutcome,
    RoutingDecision, Stage, Status,
};
pub use storage::{FsStorage, MemoryStorage, StorageGateway};
