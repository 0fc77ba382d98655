//! Core components shared by the rest of this library.

/// Counter type defining operations required of a dense counter element, with impls for the
/// unsigned primitives.
pub mod counter;

/// Pure bucket-layout arithmetic: the bijection between values and counter indexes.
pub mod layout;

/// Counter storage backends: dense arrays of each width plus a sparse packed variant.
pub mod store;
