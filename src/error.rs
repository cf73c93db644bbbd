use thiserror::Error;

use crate::value::ValueType;

/// Fatal field-set configuration error, raised before any record is
/// constructed. Never recovered; a caller that catches one must rebuild
/// the whole field set.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("duplicate field id `{0}`")]
	DuplicateField(String),
	#[error("field `{field}` depends on unknown field `{dep}`")]
	UnknownDependency { field: String, dep: String },
	#[error("field `{field}`: cannot resolve codebook `{codebook}`")]
	UnresolvedCodebook { field: String, codebook: String },
	#[error("field `{field}`: display shortcut target `{target}` has no codebook")]
	UnresolvedDisplay { field: String, target: String },
}

/// Recoverable validation failure. Never propagated as a panic; stored on
/// the field and surfaced through `Record::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("invalid {0} input")]
	Format(ValueType),
	#[error("value is not among the enumerated codes")]
	NotEnumerated,
	#[error("value is not unique")]
	NotUnique,
}
