use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Deref;

/// A value stored together with its fxhash. Change detection across the
/// engine compares hashes, never wrapper identity.
pub struct Hashed<T> {
	pub value: T,
	pub hash: u64,
}

impl<T> Hashed<T> {
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		let hash = fxhash::hash64(&value);
		Self { value, hash }
	}

	/// Replaces the stored value, reporting whether the raw value changed.
	pub fn replace(&mut self, value: T) -> bool
	where
		T: Hash,
	{
		let hash = fxhash::hash64(&value);
		if hash == self.hash {
			return false;
		}
		self.value = value;
		self.hash = hash;
		true
	}
}

impl<T> Clone for Hashed<T>
where
	T: Clone,
{
	fn clone(&self) -> Self {
		Self {
			value: self.value.clone(),
			hash: self.hash,
		}
	}
}

impl<T> Deref for Hashed<T> {
	type Target = T;
	fn deref(&self) -> &Self::Target {
		&self.value
	}
}

impl<T> Debug for Hashed<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.value.fmt(f)
	}
}
