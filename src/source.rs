use std::rc::Rc;

use crate::value::{Value, ValueType};

/// Access level queried per field on the data source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Permission {
	View,
	Insert,
	Update,
}

/// A record-shaped bag of values, insertion-ordered. Rows handed to the
/// engine are copied, never aliased.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
	values: Vec<(String, Value)>,
}

impl Row {
	pub fn new() -> Self {
		Row { values: Vec::new() }
	}

	pub fn with(mut self, id: &str, value: Value) -> Self {
		self.insert(id, value);
		self
	}

	pub fn insert(&mut self, id: &str, value: Value) {
		match self.values.iter_mut().find(|(k, _)| k == id) {
			Some(slot) => slot.1 = value,
			None => self.values.push((id.to_string(), value)),
		}
	}

	pub fn get(&self, id: &str) -> Option<&Value> {
		self.values.iter().find(|(k, _)| k == id).map(|(_, v)| v)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.values.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// Selection condition handed to the data source. The engine only ever
/// needs equality, for uniqueness probes.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
	Equal(String, Value),
}

impl Condition {
	pub fn equal(id: &str, value: Value) -> Self {
		Condition::Equal(id.to_string(), value)
	}
}

/// The record-shaped data source backing concrete fields.
pub trait DataSource {
	/// Type of the backing column, or `None` if the field has no column.
	fn column(&self, id: &str) -> Option<ValueType>;

	/// Ids of the key columns.
	fn key(&self) -> Vec<String>;

	/// Whether the current caller holds `permission` on the field.
	fn permitted(&self, id: &str, permission: Permission) -> bool;

	/// Number of stored rows matching the condition.
	fn count(&self, condition: &Condition) -> usize;
}

/// Reference-table lookup bound to a codebook field, providing the set of
/// valid (value, display) pairs.
pub trait Enumerator {
	/// Whether the current caller may read the codebook at all.
	fn readable(&self) -> bool {
		true
	}

	fn values(&self, filter: Option<&Value>, arguments: &[Value]) -> Vec<(Value, String)>;

	fn row(&self, value: &Value, filter: Option<&Value>, arguments: &[Value]) -> Option<Row>;

	fn display(&self, value: &Value, filter: Option<&Value>, arguments: &[Value]) -> Option<String> {
		self.values(filter, arguments)
			.into_iter()
			.find(|(candidate, _)| candidate == value)
			.map(|(_, display)| display)
	}
}

/// Supplies codebook enumerators at field-set construction time. Never
/// consulted during per-record operation.
pub trait Resolver {
	fn enumerator(&self, name: &str) -> Option<Rc<dyn Enumerator>>;
}
