use smallvec::SmallVec;

/// The four dependency-bearing rule kinds, with the enumeration rules
/// split into their filter and arguments halves.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RuleKind {
	Value,
	Editable,
	Visible,
	Filter,
	Arguments,
}

impl RuleKind {
	pub(crate) const ALL: [RuleKind; 5] = [
		RuleKind::Value,
		RuleKind::Editable,
		RuleKind::Visible,
		RuleKind::Filter,
		RuleKind::Arguments,
	];

	pub(crate) fn bit(self) -> u8 {
		1 << (self as u8)
	}
}

pub(crate) type Deps = SmallVec<[u32; 4]>;

/// Reverse dependency maps, built once per field set. `dependents[kind][f]`
/// lists the fields whose rule of `kind` must be marked stale when field `f`
/// changes. Lists keep field-declaration order, so one propagation pass is
/// deterministic.
pub(crate) struct DependencyGraph {
	dependents: [Vec<Deps>; 5],
	transitive: Vec<SmallVec<[u32; 8]>>,
}

impl DependencyGraph {
	/// `declared[kind][field]` holds the immediate, name-resolved dependency
	/// list of that field's rule (empty when the rule is absent or nullary).
	pub(crate) fn build(declared: &[Vec<Deps>; 5]) -> DependencyGraph {
		let count = declared[0].len();
		let value_deps = &declared[RuleKind::Value as usize];

		let transitive: Vec<SmallVec<[u32; 8]>> =
			(0..count).map(|field| expand_value(value_deps, field)).collect();

		let mut dependents: [Vec<Deps>; 5] =
			std::array::from_fn(|_| vec![Deps::new(); count]);

		// Reverse edges come from the transitively expanded dependency set:
		// a rule over a computed field also depends on whatever that
		// computer reads, arbitrarily deep.
		for kind in RuleKind::ALL {
			let k = kind as usize;
			for field in 0..count {
				let mut seen = vec![false; count];
				for &dep in &declared[k][field] {
					for expanded in
						std::iter::once(dep).chain(transitive[dep as usize].iter().copied())
					{
						if !seen[expanded as usize] {
							seen[expanded as usize] = true;
							dependents[k][expanded as usize].push(field as u32);
						}
					}
				}
			}
		}

		DependencyGraph { dependents, transitive }
	}

	pub(crate) fn dependents(&self, kind: RuleKind, field: usize) -> &[u32] {
		&self.dependents[kind as usize][field]
	}

	/// Transitive value-computer dependency closure of `field`, used to
	/// build the secrecy set.
	pub(crate) fn transitive(&self, field: usize) -> &[u32] {
		&self.transitive[field]
	}
}

/// Preorder, declaration-ordered closure of a field's value-computer
/// dependencies. Cycles are tolerated; the walk simply stops where it has
/// already been.
fn expand_value(deps: &[Deps], field: usize) -> SmallVec<[u32; 8]> {
	let mut out = SmallVec::new();
	let mut seen = vec![false; deps.len()];
	seen[field] = true;
	let mut stack: Vec<u32> = deps[field].iter().rev().copied().collect();
	while let Some(dep) = stack.pop() {
		if seen[dep as usize] {
			continue;
		}
		seen[dep as usize] = true;
		out.push(dep);
		for &next in deps[dep as usize].iter().rev() {
			stack.push(next);
		}
	}
	out
}
