//! Access policy model and the engines that translate it.
//!
//! Declarations are expanded into tuples by the [`Expander`], and the
//! current platform state is folded back into declarations by the
//! [`Normalizer`].

mod expand;
mod model;
mod normalize;

pub use expand::Expander;
pub use model::{AccessDeclaration, AccessEntry, AccessTuple};
pub use normalize::Normalizer;
