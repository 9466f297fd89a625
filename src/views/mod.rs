//! Dashboard views as polling subscriptions
//!
//! Each view owns its own [`crate::poll::Subscription`] and derived-state
//! computation; there is no cache or state shared across views. Changing a
//! view's fetch parameters swaps the subscription out wholesale, which is
//! what guarantees no overlapping timers and no stale results.

pub mod detail;
pub mod map;
pub mod registry;
pub mod summary;

pub use detail::{DetailParams, DetailSnapshot, NodeDetailView};
pub use map::{MapSnapshot, MapView, NodePosition};
pub use registry::{registry_stats, RegistrySnapshot, RegistryView};
pub use summary::{SummaryParams, SummarySnapshot, SummaryView};
