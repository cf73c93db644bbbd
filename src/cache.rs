use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::error::ConfigError;
use crate::field::FieldSet;

/// Externally-owned memoization of resolved field sets, keyed by field-set
/// identity. Nothing in the engine holds one implicitly; the owner decides
/// when to invalidate.
#[derive(Default)]
pub struct FieldSetCache {
	map: RefCell<FxHashMap<String, Rc<FieldSet>>>,
}

impl FieldSetCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, key: &str) -> Option<Rc<FieldSet>> {
		self.map.borrow().get(key).cloned()
	}

	pub fn get_or_insert_with(
		&self,
		key: &str,
		build: impl FnOnce() -> Result<Rc<FieldSet>, ConfigError>,
	) -> Result<Rc<FieldSet>, ConfigError> {
		if let Some(fields) = self.get(key) {
			return Ok(fields);
		}
		let fields = build()?;
		self.map.borrow_mut().insert(key.to_string(), fields.clone());
		Ok(fields)
	}

	pub fn invalidate(&self, key: &str) -> Option<Rc<FieldSet>> {
		self.map.borrow_mut().remove(key)
	}

	pub fn clear(&self) {
		self.map.borrow_mut().clear();
	}
}
