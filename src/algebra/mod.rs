//! Normalization and patch algebra
//!
//! Pure functions over event sequences:
//! - `normalize`: compact raw events into minimal normal form
//! - `fold` / `apply`: derive state from events
//! - `invert`: compute the events that undo a sequence
//! - `Patch`: immutable, composable handle over events
//!
//! Laws:
//!
//! ```text
//! fold(normalize(E))              == fold(E)
//! normalize(normalize(E))         == normalize(E)
//! apply(B, E ++ invert(E, B))     == B
//! ```

mod fold;
mod invert;
mod normalize;
mod patch;

pub use fold::{apply, fold};
pub use invert::invert;
pub use normalize::{is_normal_form, normalize, Normalizer};
pub use patch::Patch;
