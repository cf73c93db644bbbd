pub use enclose::*;

/// Builds a value-computer closure over the record, with optional
/// `enclose!`-style captures.
#[macro_export]
macro_rules! computer {
	(( $($d_tt:tt)* ) $record:ident => $($b:tt)*) => {
		$crate::macros::enclose!(($( $d_tt )*) move |$record: &$crate::Record| -> $crate::Value { $($b)* })
	};
	($record:ident => $($b:tt)*) => {
		move |$record: &$crate::Record| -> $crate::Value { $($b)* }
	};
}

/// Builds a boolean rule closure (editability/visibility) over the record.
#[macro_export]
macro_rules! predicate {
	(( $($d_tt:tt)* ) $record:ident => $($b:tt)*) => {
		$crate::macros::enclose!(($( $d_tt )*) move |$record: &$crate::Record| -> bool { $($b)* })
	};
	($record:ident => $($b:tt)*) => {
		move |$record: &$crate::Record| -> bool { $($b)* }
	};
}
