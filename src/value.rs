use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;

use crate::error::ValidationError;

/// Semantic type of a field value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueType {
	Boolean,
	Integer,
	Real,
	Text,
	Date,
	Binary,
	Range,
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ValueType::Boolean => "boolean",
			ValueType::Integer => "integer",
			ValueType::Real => "real",
			ValueType::Text => "text",
			ValueType::Date => "date",
			ValueType::Binary => "binary",
			ValueType::Range => "range",
		};
		f.write_str(name)
	}
}

/// A typed field value. `Null` is typeless and accepted by every field.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Null,
	Boolean(bool),
	Integer(i64),
	Real(f64),
	Text(String),
	Date(NaiveDate),
	Binary(Vec<u8>),
	Range(Option<Box<Value>>, Option<Box<Value>>),
}

impl Hash for Value {
	fn hash<H: Hasher>(&self, state: &mut H) {
		std::mem::discriminant(self).hash(state);
		match self {
			Value::Null => {}
			Value::Boolean(v) => v.hash(state),
			Value::Integer(v) => v.hash(state),
			Value::Real(v) => v.to_bits().hash(state),
			Value::Text(v) => v.hash(state),
			Value::Date(v) => v.hash(state),
			Value::Binary(v) => v.hash(state),
			Value::Range(lo, hi) => {
				lo.hash(state);
				hi.hash(state);
			}
		}
	}
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn value_type(&self) -> Option<ValueType> {
		match self {
			Value::Null => None,
			Value::Boolean(_) => Some(ValueType::Boolean),
			Value::Integer(_) => Some(ValueType::Integer),
			Value::Real(_) => Some(ValueType::Real),
			Value::Text(_) => Some(ValueType::Text),
			Value::Date(_) => Some(ValueType::Date),
			Value::Binary(_) => Some(ValueType::Binary),
			Value::Range(..) => Some(ValueType::Range),
		}
	}

	pub fn matches(&self, ty: ValueType) -> bool {
		match self.value_type() {
			None => true,
			Some(own) => own == ty,
		}
	}

	/// Parses raw user input into a value of the given type. Blank input
	/// parses to `Null` for every type.
	pub fn parse(ty: ValueType, input: &str) -> Result<Value, ValidationError> {
		let trimmed = input.trim();
		if trimmed.is_empty() {
			return Ok(Value::Null);
		}
		match ty {
			ValueType::Integer => trimmed
				.parse::<i64>()
				.map(Value::Integer)
				.map_err(|_| ValidationError::Format(ty)),
			ValueType::Real => trimmed
				.parse::<f64>()
				.map(Value::Real)
				.map_err(|_| ValidationError::Format(ty)),
			ValueType::Boolean => match trimmed {
				"T" | "t" | "true" | "1" => Ok(Value::Boolean(true)),
				"F" | "f" | "false" | "0" => Ok(Value::Boolean(false)),
				_ => Err(ValidationError::Format(ty)),
			},
			ValueType::Text => Ok(Value::Text(input.to_string())),
			ValueType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
				.map(Value::Date)
				.map_err(|_| ValidationError::Format(ty)),
			// No textual input form for these types.
			ValueType::Binary | ValueType::Range => Err(ValidationError::Format(ty)),
		}
	}

	/// Formatted export of the value. `Null` exports as an empty string.
	pub fn format(&self) -> String {
		match self {
			Value::Null => String::new(),
			Value::Boolean(v) => if *v { "T" } else { "F" }.to_string(),
			Value::Integer(v) => v.to_string(),
			Value::Real(v) => v.to_string(),
			Value::Text(v) => v.clone(),
			Value::Date(v) => v.format("%Y-%m-%d").to_string(),
			Value::Binary(v) => format!("{} B", v.len()),
			Value::Range(lo, hi) => {
				let side = |v: &Option<Box<Value>>| v.as_deref().map(Value::format).unwrap_or_default();
				format!("{}..{}", side(lo), side(hi))
			}
		}
	}

	pub fn as_integer(&self) -> Option<i64> {
		match self {
			Value::Integer(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_real(&self) -> Option<f64> {
		match self {
			Value::Real(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_boolean(&self) -> Option<bool> {
		match self {
			Value::Boolean(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_date(&self) -> Option<NaiveDate> {
		match self {
			Value::Date(v) => Some(*v),
			_ => None,
		}
	}
}
