pub mod macros;

mod cache;
mod callback;
mod error;
mod field;
mod graph;
mod hashed;
mod record;
mod secrecy;
mod source;
mod value;

pub use cache::FieldSetCache;
pub use callback::{Callback, ChangeKind};
pub use error::{ConfigError, ValidationError};
pub use field::{Editability, FieldSet, FieldSpec};
pub use graph::RuleKind;
pub use hashed::Hashed;
pub use record::Record;
pub use secrecy::HIDDEN;
pub use source::{Condition, DataSource, Enumerator, Permission, Resolver, Row};
pub use value::{Value, ValueType};
