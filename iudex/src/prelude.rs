//! Prelude for commonly used types and traits in iudex.

pub use crate::backend::{Backend, Dataset, MaskSummary};
pub use crate::config::ValidateOptions;
pub use crate::core::{ValidationReport, Validator};
pub use crate::error::{ErrorContext, IudexError, Result};
pub use crate::logging::LogConfig;
