//! Unit tests of the layout arithmetic: derived constants, the value/index bijection, and
//! equivalence-class boundaries, worked out by hand for a handful of configurations.

mod helpers;
mod init;
