//! Reactive state store for agent loops.
//!
//! One [`container::Store`] exclusively owns a canonical state tree and
//! runs every change through the same pipeline: snapshot → handler →
//! scope-filtered diff → notify. Mutations declare up front which paths
//! they touch, so change detection stays cheap and observers learn
//! precisely which parts of the tree moved. The [`fanout`] coordinator
//! layers exactly-once completion tracking for parallel subtasks on top.
//!
//! - **[`container`]**: the store itself — builder, dispatch, subscriptions.
//! - **[`mutation`]**: sync and two-phase async mutation descriptors.
//! - **[`diff`] / [`path`]**: the snapshot/diff engine and scope containment.
//! - **[`fanout`]**: named-subtask tracking with one aggregate callback.
//! - **[`agent`]**: agent-visible state and the built-in mutations over it.

pub mod agent;
pub mod container;
pub mod diff;
pub mod error;
pub mod fanout;
#[cfg(any(test, feature = "test-support"))]
pub mod logging;
pub mod mutation;
pub mod path;
pub mod subscribers;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
