//! # Shared Bus - Node-Local Event Bus
//!
//! Subsystems inside one node announce what happened (an entry committed, the
//! sync state moved, a round was abandoned) without knowing who listens.
//! Peers never see this bus; cross-node traffic goes through `PeerRpc`.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Commit path  │                    │ Client API   │
//! │              │    publish()       │ (deploy wait)│
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Delivery is best effort: a lagging subscriber skips events, so consumers
//! re-read authoritative state (the State Store height) after waking up.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, RegistryEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
