//! Composable column checks.
//!
//! A [`Check`] is a boolean predicate over one column. The leaf checks cover
//! ordering bounds ([`Check::greater`], [`Check::less_equal`], ...), set
//! membership ([`Check::is_in`], [`Check::not_in`]) and [`Check::unique`];
//! [`Check::all`] and [`Check::any`] (or the `&` and `|` operators) combine
//! them into trees.
//!
//! Checks never touch data directly. [`Check::plan`] lowers a check into the
//! mask type of a [`Backend`](crate::backend::Backend), and the backend
//! decides how that mask is executed: eagerly over an Arrow array, chunk by
//! chunk over a batch stream, or as a DataFusion expression. Every backend
//! produces the same per-row booleans for the same check and data.
//!
//! ## Null handling
//!
//! | Check | null row |
//! |---|---|
//! | ordering checks | fails |
//! | `is_in(values)` | passes iff `values` contains null |
//! | `not_in(values)` | passes iff `values` does not contain null |
//! | `*_skip_nulls` | passes |
//! | `unique()` | nulls are one value: a lone null passes, repeated nulls fail |

mod check;
mod values;

pub use check::Check;
pub use values::{CompareOp, ValueSet};
