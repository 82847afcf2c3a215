//! Story change notifications.
//!
//! Mutations publish [`ChangeEvent`]s onto a [`ChangeBus`]; a single consumer
//! task hands each event to every subscribed [`Observer`] in turn, finishing
//! with one event before starting the next.

mod bus;
mod event;

pub use crate::bus::{ChangeBus, Observer, ObserverHandle};
pub use crate::event::{ChangeEvent, ChangeKind};
