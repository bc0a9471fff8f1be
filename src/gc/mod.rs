//! Cycle collector for reference-counted objects.
//!
//! Plain reference counting cannot reclaim objects that point at each other.
//! Objects that may form such cycles return `true` from
//! [`Object::uses_garbage_collector`](crate::object::Object::uses_garbage_collector)
//! and report their outgoing strong references. When an owner of such an
//! object lets go while others remain, the collector looks at the object
//! graph around it and destroys every member that is only kept alive from
//! inside the graph.
//!
//! # Algorithm
//!
//! 1. Starting from the handed-over roots, discover every participant
//!    reachable through reported references (breadth-first, in root order).
//! 2. For each discovered object, subtract the references reported from
//!    inside the graph and the references handed to the collector from its
//!    count. Whatever is left is held from outside.
//! 3. Objects held from outside are live, and so is everything they reach.
//! 4. The rest is garbage: every garbage object first drops its references,
//!    then delete observers run in discovery order, then memory is released.
//!
//! # Deferral
//!
//! Code that builds temporary cycles can hold a [`DeferredCollection`] guard.
//! While any guard is alive, released references are queued instead of being
//! examined, and one collection pass runs when the last guard drops.

mod collector;
mod state;

pub use collector::{CollectionStats, GarbageCollector};
pub use state::{
    collect, deferral_depth, deferred_collection_pop, deferred_collection_push, is_enabled,
    set_enabled, DeferredCollection,
};

pub(crate) use state::give_reference;
