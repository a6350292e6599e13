pub mod columns;
pub mod error;
pub mod normalize;

pub use columns::{normalize_header, Aliases, ColumnMap};
pub use error::SchemaError;
pub use normalize::normalize;
