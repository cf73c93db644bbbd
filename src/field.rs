use std::rc::Rc;

use fxhash::FxHashMap;
use tracing::debug;

use crate::error::ConfigError;
use crate::graph::{DependencyGraph, Deps, RuleKind};
use crate::record::Record;
use crate::source::{DataSource, Enumerator, Resolver};
use crate::value::{Value, ValueType};

/// A rule closure evaluated against the whole record.
pub type Computer<T> = Rc<dyn Fn(&Record) -> T>;

/// Static editability of a field without a computed editability rule.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Editability {
	Always,
	OnceOnInsert,
	Never,
}

pub(crate) enum DefaultSpec {
	Value(Value),
	Func(Computer<Value>),
}

pub(crate) struct Rule<T> {
	pub(crate) deps: Deps,
	pub(crate) func: Computer<T>,
}

/// Declaration of a single field, resolved into a descriptor by
/// `FieldSet::new`.
pub struct FieldSpec {
	id: String,
	ty: Option<ValueType>,
	default: Option<DefaultSpec>,
	computer: Option<(Vec<String>, Computer<Value>)>,
	display_of: Option<String>,
	editable: Editability,
	editable_when: Option<(Vec<String>, Computer<bool>)>,
	visible: bool,
	visible_when: Option<(Vec<String>, Computer<bool>)>,
	codebook: Option<String>,
	filter: Option<(Vec<String>, Computer<Value>)>,
	arguments: Option<(Vec<String>, Computer<Vec<Value>>)>,
	unique: bool,
}

impl FieldSpec {
	pub fn new(id: &str) -> FieldSpec {
		FieldSpec {
			id: id.to_string(),
			ty: None,
			default: None,
			computer: None,
			display_of: None,
			editable: Editability::Always,
			editable_when: None,
			visible: true,
			visible_when: None,
			codebook: None,
			filter: None,
			arguments: None,
			unique: false,
		}
	}

	/// Declared type; a backing column's type wins over it.
	pub fn value_type(mut self, ty: ValueType) -> Self {
		self.ty = Some(ty);
		self
	}

	pub fn default_value(mut self, value: Value) -> Self {
		self.default = Some(DefaultSpec::Value(value));
		self
	}

	/// Default evaluated fresh for every new record.
	pub fn default_with(mut self, func: impl Fn(&Record) -> Value + 'static) -> Self {
		self.default = Some(DefaultSpec::Func(Rc::new(func)));
		self
	}

	pub fn computed(mut self, deps: &[&str], func: impl Fn(&Record) -> Value + 'static) -> Self {
		self.computer = Some((own(deps), Rc::new(func)));
		self
	}

	/// Shortcut computer: the display text of `field`'s codebook value.
	pub fn display_of(mut self, field: &str) -> Self {
		self.display_of = Some(field.to_string());
		self
	}

	pub fn editable(mut self, rule: Editability) -> Self {
		self.editable = rule;
		self
	}

	pub fn editable_when(mut self, deps: &[&str], func: impl Fn(&Record) -> bool + 'static) -> Self {
		self.editable_when = Some((own(deps), Rc::new(func)));
		self
	}

	pub fn visible(mut self, visible: bool) -> Self {
		self.visible = visible;
		self
	}

	pub fn visible_when(mut self, deps: &[&str], func: impl Fn(&Record) -> bool + 'static) -> Self {
		self.visible_when = Some((own(deps), Rc::new(func)));
		self
	}

	pub fn codebook(mut self, name: &str) -> Self {
		self.codebook = Some(name.to_string());
		self
	}

	pub fn filter_with(mut self, deps: &[&str], func: impl Fn(&Record) -> Value + 'static) -> Self {
		self.filter = Some((own(deps), Rc::new(func)));
		self
	}

	pub fn arguments_with(
		mut self,
		deps: &[&str],
		func: impl Fn(&Record) -> Vec<Value> + 'static,
	) -> Self {
		self.arguments = Some((own(deps), Rc::new(func)));
		self
	}

	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}
}

fn own(deps: &[&str]) -> Vec<String> {
	deps.iter().map(|d| d.to_string()).collect()
}

/// Immutable per-field metadata, shared by every record instance of the
/// field set.
pub(crate) struct FieldDescriptor {
	pub(crate) id: String,
	pub(crate) ty: ValueType,
	pub(crate) concrete: bool,
	pub(crate) default: Option<DefaultSpec>,
	pub(crate) computer: Option<Rule<Value>>,
	pub(crate) editable: Editability,
	pub(crate) editable_when: Option<Rule<bool>>,
	pub(crate) visible: bool,
	pub(crate) visible_when: Option<Rule<bool>>,
	pub(crate) enumerator: Option<Rc<dyn Enumerator>>,
	pub(crate) filter: Option<Rule<Value>>,
	pub(crate) arguments: Option<Rule<Vec<Value>>>,
	pub(crate) unique: bool,
}

/// A resolved field set: descriptors plus the dependency graph, built once
/// and shared across record instances.
pub struct FieldSet {
	pub(crate) fields: Vec<FieldDescriptor>,
	index: FxHashMap<String, u32>,
	pub(crate) graph: DependencyGraph,
}

impl FieldSet {
	pub fn new(
		specs: Vec<FieldSpec>,
		source: &dyn DataSource,
		resolver: Option<&dyn Resolver>,
	) -> Result<Rc<FieldSet>, ConfigError> {
		let mut index = FxHashMap::default();
		for (i, spec) in specs.iter().enumerate() {
			if index.insert(spec.id.clone(), i as u32).is_some() {
				return Err(ConfigError::DuplicateField(spec.id.clone()));
			}
		}

		let resolve = |field: &str, names: &[String]| -> Result<Deps, ConfigError> {
			names
				.iter()
				.map(|name| {
					index.get(name).copied().ok_or_else(|| ConfigError::UnknownDependency {
						field: field.to_string(),
						dep: name.to_string(),
					})
				})
				.collect()
		};

		let mut fields = Vec::with_capacity(specs.len());
		let mut displays = Vec::new();
		for (i, spec) in specs.into_iter().enumerate() {
			// A backing column makes the field concrete and its type wins
			// over the declared one.
			let column = source.column(&spec.id);
			let concrete = column.is_some();
			let ty = column.or(spec.ty).unwrap_or(ValueType::Text);

			let enumerator = match &spec.codebook {
				None => None,
				Some(name) => Some(
					resolver
						.and_then(|r| r.enumerator(name))
						.ok_or_else(|| ConfigError::UnresolvedCodebook {
							field: spec.id.clone(),
							codebook: name.clone(),
						})?,
				),
			};

			if let Some(target) = spec.display_of {
				displays.push((i, target));
			}

			let rule = |deps: &[String], func: Computer<Value>| -> Result<Rule<Value>, ConfigError> {
				Ok(Rule { deps: resolve(&spec.id, deps)?, func })
			};

			fields.push(FieldDescriptor {
				ty,
				concrete,
				default: spec.default,
				computer: match spec.computer {
					Some((deps, func)) => Some(rule(&deps, func)?),
					None => None,
				},
				editable: spec.editable,
				editable_when: match spec.editable_when {
					Some((deps, func)) => Some(Rule { deps: resolve(&spec.id, &deps)?, func }),
					None => None,
				},
				visible: spec.visible,
				visible_when: match spec.visible_when {
					Some((deps, func)) => Some(Rule { deps: resolve(&spec.id, &deps)?, func }),
					None => None,
				},
				enumerator,
				filter: match spec.filter {
					Some((deps, func)) => Some(rule(&deps, func)?),
					None => None,
				},
				arguments: match spec.arguments {
					Some((deps, func)) => Some(Rule { deps: resolve(&spec.id, &deps)?, func }),
					None => None,
				},
				unique: spec.unique,
				id: spec.id,
			});
		}

		// Codebook display shortcuts need every descriptor in place first:
		// the target's enumerator binding is part of the synthesized rule.
		for (field, target) in displays {
			let target_idx = *index.get(&target).ok_or_else(|| ConfigError::UnknownDependency {
				field: fields[field].id.clone(),
				dep: target.clone(),
			})?;
			if fields[target_idx as usize].enumerator.is_none() {
				return Err(ConfigError::UnresolvedDisplay {
					field: fields[field].id.clone(),
					target,
				});
			}
			// The lookup goes through the target's runtime filter and
			// arguments, so their dependencies are this rule's too.
			let mut deps = Deps::from_slice(&[target_idx]);
			if let Some(rule) = &fields[target_idx as usize].filter {
				deps.extend_from_slice(&rule.deps);
			}
			if let Some(rule) = &fields[target_idx as usize].arguments {
				deps.extend_from_slice(&rule.deps);
			}
			let id = target.clone();
			fields[field].computer = Some(Rule {
				deps,
				func: Rc::new(move |record: &Record| match record.codebook_display(&id) {
					Some(display) => Value::Text(display),
					None => Value::Null,
				}),
			});
		}

		let count = fields.len();
		let mut declared: [Vec<Deps>; 5] = std::array::from_fn(|_| vec![Deps::new(); count]);
		for (i, field) in fields.iter().enumerate() {
			let mut put = |kind: RuleKind, deps: Option<&Deps>| {
				if let Some(deps) = deps {
					declared[kind as usize][i] = deps.clone();
				}
			};
			put(RuleKind::Value, field.computer.as_ref().map(|r| &r.deps));
			put(RuleKind::Editable, field.editable_when.as_ref().map(|r| &r.deps));
			put(RuleKind::Visible, field.visible_when.as_ref().map(|r| &r.deps));
			put(RuleKind::Filter, field.filter.as_ref().map(|r| &r.deps));
			put(RuleKind::Arguments, field.arguments.as_ref().map(|r| &r.deps));
		}
		let graph = DependencyGraph::build(&declared);

		debug!(fields = count, "field set resolved");
		Ok(Rc::new(FieldSet { fields, index, graph }))
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn contains(&self, id: &str) -> bool {
		self.index.contains_key(id)
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.fields.iter().map(|f| f.id.as_str())
	}

	/// Contract violation to ask for a field the set does not declare.
	pub(crate) fn lookup(&self, id: &str) -> usize {
		match self.index.get(id) {
			Some(idx) => *idx as usize,
			None => panic!("unknown field `{id}`"),
		}
	}
}
