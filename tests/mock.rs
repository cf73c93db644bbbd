use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use mockall::*;

use reckon::{Condition, DataSource, Enumerator, Permission, Resolver, Row, Value, ValueType};

#[automock]
pub trait Spy {
	fn trigger(&self, tag: String);
}

#[derive(Clone)]
pub struct SharedMock(Arc<Mutex<MockSpy>>);

impl SharedMock {
	pub fn new() -> SharedMock {
		SharedMock(Arc::new(Mutex::new(MockSpy::new())))
	}

	pub fn get<'a>(&'a self) -> MutexGuard<'a, MockSpy> {
		return self.0.lock().unwrap();
	}
}

/// An in-memory data source: a column list, per-field permission denials
/// and stored values for uniqueness probes.
pub struct TestSource {
	columns: Vec<(String, ValueType)>,
	denied_view: Vec<String>,
	denied_update: Vec<String>,
	stored: Vec<(String, Value)>,
}

impl TestSource {
	pub fn new(columns: &[(&str, ValueType)]) -> TestSource {
		TestSource {
			columns: columns.iter().map(|(id, ty)| (id.to_string(), *ty)).collect(),
			denied_view: Vec::new(),
			denied_update: Vec::new(),
			stored: Vec::new(),
		}
	}

	pub fn deny_view(mut self, id: &str) -> Self {
		self.denied_view.push(id.to_string());
		self
	}

	pub fn deny_update(mut self, id: &str) -> Self {
		self.denied_update.push(id.to_string());
		self
	}

	pub fn with_stored(mut self, id: &str, value: Value) -> Self {
		self.stored.push((id.to_string(), value));
		self
	}
}

impl DataSource for TestSource {
	fn column(&self, id: &str) -> Option<ValueType> {
		self.columns.iter().find(|(k, _)| k == id).map(|(_, ty)| *ty)
	}

	fn key(&self) -> Vec<String> {
		self.columns.first().map(|(k, _)| vec![k.clone()]).unwrap_or_default()
	}

	fn permitted(&self, id: &str, permission: Permission) -> bool {
		match permission {
			Permission::View => !self.denied_view.iter().any(|d| d == id),
			Permission::Insert | Permission::Update => {
				!self.denied_update.iter().any(|d| d == id)
			}
		}
	}

	fn count(&self, condition: &Condition) -> usize {
		let Condition::Equal(id, value) = condition;
		self.stored.iter().filter(|(k, v)| k == id && v == value).count()
	}
}

/// A fixed codebook. A text filter value restricts it to codes with that
/// prefix; text arguments restrict it to exactly those codes.
pub struct StaticEnumerator {
	pairs: Vec<(Value, String)>,
	readable: bool,
}

impl StaticEnumerator {
	pub fn new(pairs: &[(&str, &str)]) -> StaticEnumerator {
		StaticEnumerator {
			pairs: pairs
				.iter()
				.map(|(code, display)| (Value::Text(code.to_string()), display.to_string()))
				.collect(),
			readable: true,
		}
	}

	pub fn unreadable(mut self) -> Self {
		self.readable = false;
		self
	}
}

impl Enumerator for StaticEnumerator {
	fn readable(&self) -> bool {
		self.readable
	}

	fn values(&self, filter: Option<&Value>, arguments: &[Value]) -> Vec<(Value, String)> {
		let prefix = filter.and_then(|f| f.as_text());
		let allowed: Vec<&str> = arguments.iter().filter_map(|a| a.as_text()).collect();
		self.pairs
			.iter()
			.filter(|(code, _)| {
				code.as_text().is_some_and(|c| {
					prefix.map_or(true, |p| c.starts_with(p))
						&& (allowed.is_empty() || allowed.contains(&c))
				})
			})
			.cloned()
			.collect()
	}

	fn row(&self, value: &Value, filter: Option<&Value>, arguments: &[Value]) -> Option<Row> {
		self.values(filter, arguments)
			.into_iter()
			.find(|(code, _)| code == value)
			.map(|(code, display)| {
				Row::new().with("value", code).with("display", Value::Text(display))
			})
	}
}

#[derive(Default)]
pub struct TestResolver {
	books: Vec<(String, Rc<StaticEnumerator>)>,
}

impl TestResolver {
	pub fn new() -> TestResolver {
		TestResolver::default()
	}

	pub fn with(mut self, name: &str, enumerator: StaticEnumerator) -> Self {
		self.books.push((name.to_string(), Rc::new(enumerator)));
		self
	}
}

impl Resolver for TestResolver {
	fn enumerator(&self, name: &str) -> Option<Rc<dyn Enumerator>> {
		self.books
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, e)| e.clone() as Rc<dyn Enumerator>)
	}
}
