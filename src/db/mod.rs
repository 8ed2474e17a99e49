//! Database module: schema, job rows, search filters and SQL repositories.
//!
//! - `model`: rows returned by the repositories.
//! - `filter`: typed search filters rendered into parameterized SQL.
//! - `repo`: SQL-only functions.
//!
//! The repository API is re-exported at `crate::db::*`.

pub mod filter;
pub mod model;
pub mod repo;

pub use filter::{JobFilters, SortField, SortOrder};
pub use model::{FilterOptions, JobRecord, JobStats, NewJob};
pub use repo::*;
