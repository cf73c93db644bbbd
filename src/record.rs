use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fxhash::FxHashMap;
use tracing::{debug, trace};

use crate::callback::{Callback, Callbacks, ChangeKind};
use crate::error::ValidationError;
use crate::field::{DefaultSpec, Editability, FieldDescriptor, FieldSet};
use crate::graph::RuleKind;
use crate::hashed::Hashed;
use crate::secrecy::{secret_fields, HIDDEN};
use crate::source::{Condition, DataSource, Permission, Row};
use crate::value::Value;

/// One presented record: the value store, dirty tracking, secrecy set and
/// callback registry over a shared field set. Owned by a single logical
/// session; all recomputation happens inline on the calling thread.
pub struct Record {
	fields: Rc<FieldSet>,
	source: Rc<dyn DataSource>,
	secret: Vec<bool>,
	new: Cell<bool>,
	values: RefCell<Vec<Hashed<Value>>>,
	snapshot: RefCell<Vec<Hashed<Value>>>,
	supplied: RefCell<Option<Row>>,
	dirty: RefCell<Vec<u8>>,
	editable_cache: RefCell<Vec<Option<bool>>>,
	visible_cache: RefCell<Vec<Option<bool>>>,
	filter_cache: RefCell<Vec<Option<Hashed<Value>>>>,
	arguments_cache: RefCell<Vec<Option<Hashed<Vec<Value>>>>>,
	invalid: RefCell<FxHashMap<u32, (String, ValidationError)>>,
	validated: RefCell<Vec<bool>>,
	callbacks: Callbacks,
}

impl Record {
	/// `row = None` starts a new, not-yet-persisted record; defaults apply.
	pub fn new(
		fields: Rc<FieldSet>,
		source: Rc<dyn DataSource>,
		row: Option<Row>,
		prefill: Option<&Row>,
	) -> Record {
		let count = fields.len();
		let secret = secret_fields(&fields, source.as_ref());
		let record = Record {
			secret,
			new: Cell::new(true),
			values: RefCell::new((0..count).map(|_| Hashed::new(Value::Null)).collect()),
			snapshot: RefCell::new((0..count).map(|_| Hashed::new(Value::Null)).collect()),
			supplied: RefCell::new(None),
			dirty: RefCell::new(vec![0; count]),
			editable_cache: RefCell::new(vec![None; count]),
			visible_cache: RefCell::new(vec![None; count]),
			filter_cache: RefCell::new(vec![None; count]),
			arguments_cache: RefCell::new(vec![None; count]),
			invalid: RefCell::new(FxHashMap::default()),
			validated: RefCell::new(vec![false; count]),
			callbacks: Callbacks::default(),
			fields,
			source,
		};
		record.set_row(row, true, prefill);
		record
	}

	pub fn is_new(&self) -> bool {
		self.new.get()
	}

	fn descriptor(&self, idx: usize) -> &FieldDescriptor {
		&self.fields.fields[idx]
	}

	fn is_dirty(&self, idx: usize, kind: RuleKind) -> bool {
		self.dirty.borrow()[idx] & kind.bit() != 0
	}

	fn clear_dirty(&self, idx: usize, kind: RuleKind) {
		self.dirty.borrow_mut()[idx] &= !kind.bit();
	}

	fn mark_dirty(&self, idx: usize, kind: RuleKind) {
		self.dirty.borrow_mut()[idx] |= kind.bit();
	}

	/// Marks everything whose rule of any kind reads `idx`, through the
	/// expanded reverse edges.
	fn mark_dependents(&self, idx: usize) {
		for kind in RuleKind::ALL {
			for &dep in self.fields.graph.dependents(kind, idx) {
				self.mark_dirty(dep as usize, kind);
			}
		}
	}

	fn fire(&self, kind: ChangeKind, idx: Option<usize>) {
		let id = idx.map(|i| self.descriptor(i).id.clone());
		self.callbacks.fire(self, kind, id.as_deref());
	}

	// ------------------------------------------------------------------
	// Value read/write

	/// Current value, recomputing first when stale.
	pub fn get(&self, id: &str) -> Value {
		let idx = self.fields.lookup(id);
		self.compute_value(idx);
		self.values.borrow()[idx].value.clone()
	}

	/// Current stored value without recomputation, possibly stale. Safe to
	/// call from inside callbacks and computers.
	pub fn get_lazy(&self, id: &str) -> Value {
		let idx = self.fields.lookup(id);
		self.values.borrow()[idx].value.clone()
	}

	fn compute_value(&self, idx: usize) {
		if !self.is_dirty(idx, RuleKind::Value) {
			return;
		}
		// Cleared before the computer runs: a computer reaching its own
		// field (directly or through a dependent) reads the current value
		// instead of recursing.
		self.clear_dirty(idx, RuleKind::Value);
		let Some(rule) = self.descriptor(idx).computer.as_ref() else {
			return;
		};
		let value = (rule.func)(self);
		if self.store(idx, value) {
			trace!(field = %self.descriptor(idx).id, "recomputed");
			self.mark_dependents(idx);
			self.fire(ChangeKind::Change, Some(idx));
		}
	}

	fn store(&self, idx: usize, value: Value) -> bool {
		self.values.borrow_mut()[idx].replace(value)
	}

	/// Writes a value. The value's type must match the field's resolved
	/// type; a mismatch is a caller contract violation.
	pub fn set(&self, id: &str, value: Value) {
		let idx = self.fields.lookup(id);
		let field = self.descriptor(idx);
		assert!(
			value.matches(field.ty),
			"type mismatch writing `{id}`: expected {}",
			field.ty
		);
		if !self.store(idx, value) {
			return;
		}
		self.invalid.borrow_mut().remove(&(idx as u32));
		self.validated.borrow_mut()[idx] = false;
		self.mark_dependents(idx);
		// UI consumers need editability/visibility synchronously, without
		// a read of the value itself.
		self.refresh_bools();
		self.fire(ChangeKind::Change, Some(idx));
	}

	/// The write performed by `validate` on success: identical to `set`
	/// except that the CHANGE callback for this field is suppressed.
	fn write_quiet(&self, idx: usize, value: Value) {
		if !self.store(idx, value) {
			return;
		}
		self.mark_dependents(idx);
		self.refresh_bools();
	}

	// ------------------------------------------------------------------
	// Editability / visibility / enumerations

	pub fn editable(&self, id: &str) -> bool {
		let idx = self.fields.lookup(id);
		if self.secret[idx] {
			return false;
		}
		let field = self.descriptor(idx);
		let permission = if self.new.get() { Permission::Insert } else { Permission::Update };
		if field.concrete && !self.source.permitted(id, permission) {
			return false;
		}
		if let Some(enumerator) = &field.enumerator {
			if !enumerator.readable() {
				return false;
			}
		}
		if field.editable_when.is_some() {
			return self.computed_editable(idx);
		}
		match field.editable {
			Editability::Always => true,
			Editability::Never => false,
			Editability::OnceOnInsert => self.new.get(),
		}
	}

	pub fn visible(&self, id: &str) -> bool {
		let idx = self.fields.lookup(id);
		if self.descriptor(idx).visible_when.is_some() {
			return self.computed_visible(idx);
		}
		self.descriptor(idx).visible
	}

	fn computed_editable(&self, idx: usize) -> bool {
		let rule = self.descriptor(idx).editable_when.as_ref().unwrap();
		let cached = self.editable_cache.borrow()[idx];
		if !self.is_dirty(idx, RuleKind::Editable) {
			if let Some(value) = cached {
				return value;
			}
		}
		self.clear_dirty(idx, RuleKind::Editable);
		let result = (rule.func)(self);
		self.editable_cache.borrow_mut()[idx] = Some(result);
		if cached.is_some_and(|previous| previous != result) {
			self.fire(ChangeKind::Editability, Some(idx));
		}
		result
	}

	fn computed_visible(&self, idx: usize) -> bool {
		let rule = self.descriptor(idx).visible_when.as_ref().unwrap();
		let cached = self.visible_cache.borrow()[idx];
		if !self.is_dirty(idx, RuleKind::Visible) {
			if let Some(value) = cached {
				return value;
			}
		}
		self.clear_dirty(idx, RuleKind::Visible);
		let result = (rule.func)(self);
		self.visible_cache.borrow_mut()[idx] = Some(result);
		if cached.is_some_and(|previous| previous != result) {
			self.fire(ChangeKind::Visibility, Some(idx));
		}
		result
	}

	fn runtime_filter(&self, idx: usize) -> Option<Value> {
		let rule = self.descriptor(idx).filter.as_ref()?;
		let needed = {
			let cache = self.filter_cache.borrow();
			cache[idx].is_none() || self.is_dirty(idx, RuleKind::Filter)
		};
		if needed {
			self.clear_dirty(idx, RuleKind::Filter);
			let value = Hashed::new((rule.func)(self));
			let mut cache = self.filter_cache.borrow_mut();
			let changed = cache[idx]
				.as_ref()
				.is_some_and(|previous| previous.hash != value.hash);
			cache[idx] = Some(value);
			drop(cache);
			if changed {
				self.fire(ChangeKind::Enumeration, Some(idx));
			}
		}
		Some(self.filter_cache.borrow()[idx].as_ref().unwrap().value.clone())
	}

	fn runtime_arguments(&self, idx: usize) -> Vec<Value> {
		let Some(rule) = self.descriptor(idx).arguments.as_ref() else {
			return Vec::new();
		};
		let needed = {
			let cache = self.arguments_cache.borrow();
			cache[idx].is_none() || self.is_dirty(idx, RuleKind::Arguments)
		};
		if needed {
			self.clear_dirty(idx, RuleKind::Arguments);
			let value = Hashed::new((rule.func)(self));
			let mut cache = self.arguments_cache.borrow_mut();
			let changed = cache[idx]
				.as_ref()
				.is_some_and(|previous| previous.hash != value.hash);
			cache[idx] = Some(value);
			drop(cache);
			if changed {
				self.fire(ChangeKind::Enumeration, Some(idx));
			}
		}
		self.arguments_cache.borrow()[idx].as_ref().unwrap().value.clone()
	}

	/// The (value, display) pairs of a codebook-bound field, filtered by
	/// its runtime filter/arguments rules. `None` when the field has no
	/// codebook, or the caller cannot read it.
	pub fn enumerate(&self, id: &str) -> Option<Vec<(Value, String)>> {
		let idx = self.fields.lookup(id);
		let enumerator = self.descriptor(idx).enumerator.clone()?;
		if !enumerator.readable() {
			return None;
		}
		let filter = self.runtime_filter(idx);
		let arguments = self.runtime_arguments(idx);
		Some(enumerator.values(filter.as_ref(), &arguments))
	}

	/// Display text of the field's current codebook value.
	pub(crate) fn codebook_display(&self, id: &str) -> Option<String> {
		let idx = self.fields.lookup(id);
		let enumerator = self.descriptor(idx).enumerator.clone()?;
		let value = self.get(id);
		if value.is_null() {
			return None;
		}
		let filter = self.runtime_filter(idx);
		let arguments = self.runtime_arguments(idx);
		enumerator.display(&value, filter.as_ref(), &arguments)
	}

	fn refresh_bools(&self) {
		for idx in 0..self.fields.len() {
			if self.descriptor(idx).editable_when.is_some() && self.is_dirty(idx, RuleKind::Editable) {
				self.computed_editable(idx);
			}
			if self.descriptor(idx).visible_when.is_some() && self.is_dirty(idx, RuleKind::Visible) {
				self.computed_visible(idx);
			}
		}
	}

	fn refresh_enumerations(&self) {
		for idx in 0..self.fields.len() {
			if self.descriptor(idx).filter.is_some() {
				self.runtime_filter(idx);
			}
			if self.descriptor(idx).arguments.is_some() {
				self.runtime_arguments(idx);
			}
		}
	}

	// ------------------------------------------------------------------
	// Secrecy

	/// Whether the field's value must not be disclosed to the caller.
	pub fn hidden(&self, id: &str) -> bool {
		self.secret[self.fields.lookup(id)]
	}

	/// Formatted export for rendering. Secret fields export the fixed
	/// hidden placeholder, never the real value.
	pub fn display(&self, id: &str) -> String {
		let idx = self.fields.lookup(id);
		if self.secret[idx] {
			return HIDDEN.to_string();
		}
		self.get(id).format()
	}

	// ------------------------------------------------------------------
	// Row replacement

	/// Replaces the whole row. `row = None` resets to a new record with
	/// defaults. Initial values are taken from, in priority order: the
	/// prefill, the supplied row, the field default (new records only);
	/// fields with a computer and no supplied value stay stale until read.
	pub fn set_row(&self, row: Option<Row>, reset: bool, prefill: Option<&Row>) {
		debug!(new = row.is_none(), reset, "row replaced");
		let count = self.fields.len();
		self.new.set(row.is_none());

		let mut provided = vec![false; count];
		{
			let mut values = self.values.borrow_mut();
			for (idx, field) in self.fields.fields.iter().enumerate() {
				let value = prefill
					.and_then(|p| p.get(&field.id))
					.or_else(|| row.as_ref().and_then(|r| r.get(&field.id)));
				match value {
					Some(value) => {
						assert!(
							value.matches(field.ty),
							"type mismatch in row for `{}`: expected {}",
							field.id,
							field.ty
						);
						values[idx] = Hashed::new(value.clone());
						provided[idx] = true;
					}
					None => values[idx] = Hashed::new(Value::Null),
				}
			}
		}

		self.invalid.borrow_mut().clear();
		self.validated.borrow_mut().iter_mut().for_each(|v| *v = false);
		self.dirty.borrow_mut().iter_mut().for_each(|b| *b = 0);
		self.editable_cache.borrow_mut().iter_mut().for_each(|v| *v = None);
		self.visible_cache.borrow_mut().iter_mut().for_each(|v| *v = None);
		self.filter_cache.borrow_mut().iter_mut().for_each(|v| *v = None);
		self.arguments_cache.borrow_mut().iter_mut().for_each(|v| *v = None);
		*self.supplied.borrow_mut() = row;

		// Defaults are evaluated fresh for new records, never through the
		// computer.
		if self.new.get() {
			for idx in 0..count {
				if provided[idx] {
					continue;
				}
				let value = match &self.descriptor(idx).default {
					None => continue,
					Some(DefaultSpec::Value(value)) => value.clone(),
					Some(DefaultSpec::Func(func)) => {
						let func = func.clone();
						func(self)
					}
				};
				self.values.borrow_mut()[idx] = Hashed::new(value);
				provided[idx] = true;
			}
		}

		for idx in 0..count {
			let field = self.descriptor(idx);
			if field.computer.is_some() && !provided[idx] {
				self.mark_dirty(idx, RuleKind::Value);
			}
			if field.editable_when.is_some() {
				self.mark_dirty(idx, RuleKind::Editable);
			}
			if field.visible_when.is_some() {
				self.mark_dirty(idx, RuleKind::Visible);
			}
			if field.filter.is_some() {
				self.mark_dirty(idx, RuleKind::Filter);
			}
			if field.arguments.is_some() {
				self.mark_dirty(idx, RuleKind::Arguments);
			}
		}

		if reset {
			*self.snapshot.borrow_mut() = self.values.borrow().clone();
		}

		// Eager pass over the full rule set; a write does only the
		// dependents of the written field.
		self.refresh_bools();
		self.refresh_enumerations();

		// One broadcast instead of per-field callbacks.
		self.fire(ChangeKind::Change, None);
	}

	/// Current values of the source's key columns, identifying the stored
	/// row this record presents. Key columns the field set does not
	/// declare are skipped.
	pub fn key(&self) -> Row {
		let mut row = Row::new();
		for id in self.source.key() {
			if !self.fields.contains(&id) {
				continue;
			}
			let idx = self.fields.lookup(&id);
			self.compute_value(idx);
			row.insert(&id, self.values.borrow()[idx].value.clone());
		}
		row
	}

	/// Snapshot of the current concrete values, computed where stale.
	pub fn row(&self) -> Row {
		let mut row = Row::new();
		for idx in 0..self.fields.len() {
			let field = self.descriptor(idx);
			if !field.concrete {
				continue;
			}
			self.compute_value(idx);
			row.insert(&field.id, self.values.borrow()[idx].value.clone());
		}
		row
	}

	/// The row as of the last reset: with `initialized`, the
	/// post-initialization snapshot `changed()` compares against; without,
	/// the raw row exactly as supplied to `set_row`.
	pub fn original_row(&self, initialized: bool) -> Row {
		if !initialized {
			return self.supplied.borrow().clone().unwrap_or_default();
		}
		let snapshot = self.snapshot.borrow();
		let mut row = Row::new();
		for (idx, field) in self.fields.fields.iter().enumerate() {
			if field.concrete {
				row.insert(&field.id, snapshot[idx].value.clone());
			}
		}
		row
	}

	// ------------------------------------------------------------------
	// Change tracking

	pub fn changed(&self) -> bool {
		if !self.invalid.borrow().is_empty() {
			return true;
		}
		let values = self.values.borrow();
		let snapshot = self.snapshot.borrow();
		self.fields
			.fields
			.iter()
			.enumerate()
			.any(|(idx, field)| field.concrete && values[idx].hash != snapshot[idx].hash)
	}

	pub fn field_changed(&self, id: &str) -> bool {
		let idx = self.fields.lookup(id);
		if self.invalid.borrow().contains_key(&(idx as u32)) {
			return true;
		}
		self.descriptor(idx).concrete
			&& self.values.borrow()[idx].hash != self.snapshot.borrow()[idx].hash
	}

	// ------------------------------------------------------------------
	// Validation

	/// Parses and validates raw input. On success the value is written
	/// (with the CHANGE callback suppressed; the caller re-renders) and
	/// `None` is returned. On failure the raw input and error are recorded
	/// and the stored value is left untouched.
	pub fn validate(&self, id: &str, input: &str) -> Option<ValidationError> {
		let idx = self.fields.lookup(id);
		let field = self.descriptor(idx);

		let value = match Value::parse(field.ty, input) {
			Ok(value) => value,
			Err(error) => return Some(self.reject(idx, input, error)),
		};

		if !value.is_null() {
			if let Some(enumerator) = field.enumerator.clone() {
				let filter = self.runtime_filter(idx);
				let arguments = self.runtime_arguments(idx);
				if enumerator.row(&value, filter.as_ref(), &arguments).is_none() {
					return Some(self.reject(idx, input, ValidationError::NotEnumerated));
				}
			}
			if field.unique {
				let original = self.snapshot.borrow()[idx].hash;
				if fxhash::hash64(&value) != original
					&& self.source.count(&Condition::equal(id, value.clone())) > 0
				{
					return Some(self.reject(idx, input, ValidationError::NotUnique));
				}
			}
		}

		self.invalid.borrow_mut().remove(&(idx as u32));
		self.write_quiet(idx, value);
		self.validated.borrow_mut()[idx] = true;
		None
	}

	fn reject(&self, idx: usize, input: &str, error: ValidationError) -> ValidationError {
		trace!(field = %self.descriptor(idx).id, %error, "input rejected");
		self.invalid
			.borrow_mut()
			.insert(idx as u32, (input.to_string(), error.clone()));
		error
	}

	/// Last rejected raw input for the field, if any.
	pub fn invalid_input(&self, id: &str) -> Option<String> {
		let idx = self.fields.lookup(id);
		self.invalid.borrow().get(&(idx as u32)).map(|(input, _)| input.clone())
	}

	/// Last recorded validation error for the field, if any.
	pub fn validation_error(&self, id: &str) -> Option<ValidationError> {
		let idx = self.fields.lookup(id);
		self.invalid.borrow().get(&(idx as u32)).map(|(_, error)| error.clone())
	}

	/// Whether the field's current value came through a successful
	/// `validate` call (and has not been overwritten since).
	pub fn validated(&self, id: &str) -> bool {
		self.validated.borrow()[self.fields.lookup(id)]
	}

	// ------------------------------------------------------------------
	// Callbacks

	/// Registers the single handler for (kind, field). Registering twice
	/// for the same pair is a fatal configuration error.
	pub fn register_callback(&self, kind: ChangeKind, id: &str, callback: Callback) {
		self.fields.lookup(id);
		self.callbacks.register(kind, id, callback);
	}
}
