pub mod aggregate;
pub mod config;
pub mod export;
pub mod filter;
pub mod load;
pub mod record;
pub mod render;
pub mod schema;
pub mod server;

pub use config::Settings;
pub use filter::{Filter, Selection};
pub use record::{Dataset, DateField, Field, Record};
pub use schema::SchemaError;
