//! Entity trait: identity that survives state changes.
//!
//! Used for child records that live inside an aggregate (e.g. the parts
//! consumed by a work order), which are identified by a local key rather than
//! an aggregate id.

pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
