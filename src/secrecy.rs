use tracing::trace;

use crate::field::FieldSet;
use crate::source::{DataSource, Permission};

/// Fixed placeholder substituted for the export of a secret field.
pub const HIDDEN: &str = "***";

/// Computes the secrecy set for one record instance: a concrete field is
/// secret when VIEW is denied on it, a virtual field when its transitive
/// value-computer closure touches any secret concrete field.
pub(crate) fn secret_fields(fields: &FieldSet, source: &dyn DataSource) -> Vec<bool> {
	let mut secret = vec![false; fields.len()];
	for (i, field) in fields.fields.iter().enumerate() {
		if field.concrete && !source.permitted(&field.id, Permission::View) {
			secret[i] = true;
			trace!(field = %field.id, "view denied");
		}
	}
	let direct = secret.clone();
	for (i, field) in fields.fields.iter().enumerate() {
		if field.concrete || secret[i] {
			continue;
		}
		if fields.graph.transitive(i).iter().any(|&dep| direct[dep as usize]) {
			secret[i] = true;
			trace!(field = %field.id, "secrecy propagated");
		}
	}
	secret
}
