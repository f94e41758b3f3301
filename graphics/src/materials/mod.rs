//! Material and compute-kernel binding state.
//!
//! The binding layer sits between shader layouts ([`crate::shader`]) and the
//! backend: it owns no GPU objects, only the mapping from named parameters to
//! resources and the per-frame dynamic-offset bookkeeping. See
//! [`binding_set`] for the frame protocol.

pub mod binding_set;

pub use binding_set::{BindingError, BindingSet, UniformHandle, UNSET_OFFSET};
