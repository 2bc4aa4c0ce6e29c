//! Data plane components
//!
//! Hot-path hooks (forwarding engine, neighbor snooper) and the state and
//! control-plane pieces around them: FIB, neighbor table, remap table,
//! counters, event channel and the daemon that binds them to sockets.

mod events;
mod fib;
mod forwarder;
mod hook;
mod neighbor_sync;
mod neighbor_table;
mod remap;
mod resolver;
mod router;
mod routing;
mod snooper;
mod static_fib;
mod stats;

pub use events::{
    event_channel, BindingRecord, EventReceiver, EventSender, NeighborBinding,
    BINDING_RECORD_LEN, DEFAULT_EVENT_CAPACITY,
};
pub use fib::{AddressFamily, FibCode, FibLookup, FibQuery, FibResult};
pub use forwarder::ForwardingEngine;
pub use hook::{Disposition, HookContext, NextHop};
pub use neighbor_sync::NeighborSync;
pub use neighbor_table::{NeighborState, NeighborTable};
pub use remap::{InterfaceRemap, REMAP_CAPACITY};
pub use resolver::{InterfaceAddrs, NeighborResolver, PendingQueue, Resolve};
pub use router::{Hooks, Outbound, PortConfig, Router, RouterSettings};
pub use routing::{Route, RouteKind, RouteSource, RoutingTable};
pub use snooper::{extract_binding, NeighborSnooper};
pub use static_fib::{FibInterface, StaticFib};
pub use stats::{Count, CounterSnapshot, Outcome, OutcomeCounters};
