//! Aggregation strategies.
//!
//! An [`Aggregator`] defines what a window holds and how it becomes rows.
//! The window engine owns the states and decides when to render them; an
//! aggregator never sees more than one window at a time.
//!
//! Strategies:
//! - [`TypeCounter`]: events per normalized type tag
//! - [`UserCounter`]: events per type/actor/repo triple
//! - [`DetailAggregator`] with [`PushDetail`], [`CreateDetail`],
//!   [`DeleteDetail`] or [`WatchDetail`]: one row per distinct key of a
//!   single event type
//!
//! [`EventRows`] is not windowed at all; it writes one row per event.

mod counters;
mod detail;
mod events;

pub use counters::{KNOWN_TYPE_TAGS, TypeCounter, TypeCounts, UserCounter};
pub use detail::{
    CreateDetail, DeleteDetail, Detail, DetailAggregator, DetailKey, EventCount, PushDetail,
    PushRecord, WatchDetail,
};
pub use events::EventRows;

use crate::row::Row;
use ghstats_core::{Event, WindowKey};

/// Per-window accumulation logic.
pub trait Aggregator {
    /// Accumulated state of one window.
    type State;

    /// Columns every rendered row starts with, in order. Empty means the
    /// column set is derived from the rows.
    fn columns(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fresh state for a newly opened window.
    fn init_window(&self, key: WindowKey) -> Self::State;

    /// Fold one event into a window.
    fn fold(&self, key: WindowKey, state: &mut Self::State, event: &Event);

    /// Render a finished window. Must not depend on how often it is called.
    fn render(&self, key: WindowKey, state: &Self::State) -> Vec<Row>;
}
