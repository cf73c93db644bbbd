use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::record::Record;

/// Kind of change a callback subscribes to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChangeKind {
	Change,
	Editability,
	Visibility,
	Enumeration,
}

pub type Callback = Rc<dyn Fn(&Record)>;

/// Single-subscriber notification registry. Events detected while a
/// handler runs are queued and drained by the outermost dispatch, so the
/// fan-out never re-enters itself.
#[derive(Default)]
pub(crate) struct Callbacks {
	// Registration-ordered; field sets are small and a broadcast must be
	// deterministic.
	handlers: RefCell<Vec<(ChangeKind, String, Callback)>>,
	queue: RefCell<VecDeque<(ChangeKind, Option<String>)>>,
	dispatching: Cell<bool>,
}

impl Callbacks {
	/// At most one handler per (kind, field); re-registration is a fatal
	/// configuration error.
	pub(crate) fn register(&self, kind: ChangeKind, id: &str, callback: Callback) {
		let mut handlers = self.handlers.borrow_mut();
		if handlers.iter().any(|(k, i, _)| *k == kind && i == id) {
			panic!("callback already registered for {kind:?} on field `{id}`");
		}
		handlers.push((kind, id.to_string(), callback));
	}

	/// Fires the handler for (kind, field), or every handler of `kind`
	/// when no field is given (row-replacement broadcast).
	pub(crate) fn fire(&self, record: &Record, kind: ChangeKind, field: Option<&str>) {
		self.queue
			.borrow_mut()
			.push_back((kind, field.map(str::to_string)));
		if self.dispatching.get() {
			return;
		}
		self.dispatching.set(true);
		loop {
			let next = self.queue.borrow_mut().pop_front();
			let Some((kind, field)) = next else { break };
			match field {
				Some(id) => {
					let handler = self
						.handlers
						.borrow()
						.iter()
						.find(|(k, i, _)| *k == kind && *i == id)
						.map(|(_, _, handler)| handler.clone());
					if let Some(handler) = handler {
						handler(record);
					}
				}
				None => {
					let handlers: Vec<Callback> = self
						.handlers
						.borrow()
						.iter()
						.filter(|(k, _, _)| *k == kind)
						.map(|(_, _, handler)| handler.clone())
						.collect();
					for handler in handlers {
						handler(record);
					}
				}
			}
		}
		self.dispatching.set(false);
	}
}
