//! Belief base - storages, views, and belief-change triggers.
//!
//! Beliefs live in physical storages behind the [`Storage`] contract and
//! are organized into a tree of named views held by a [`ViewArena`]. Every
//! literal mutation emits exactly one add/delete trigger, which is how data
//! mutation becomes control flow in the reasoning cycle.

mod storage;
mod view;

pub use storage::{EmptyStorage, MemoryStorage, Storage};
pub use view::{ViewArena, ViewGenerator, ViewId};
