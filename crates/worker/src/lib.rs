//! The offline cache worker for stashway.
//!
//! This crate implements the controller that sits between a hosting page
//! and the network: it classifies every read request against an ordered
//! routing policy, answers from a versioned cache store or from the
//! network according to the matched strategy, and synthesizes an offline
//! fallback when both fail.

pub mod events;
pub mod fallback;
pub mod fetch;
pub mod policy;
pub mod request;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use events::{Notification, NotificationAction, PushPayload, WindowDirective, WorkerMessage};
pub use fetch::{FetchedResponse, HttpFetcher, NetworkFetcher};
pub use policy::{Classification, RoutingPolicy, Strategy};
pub use request::{FallbackKind, ResponseSource, WorkerRequest, WorkerResponse};
pub use worker::{LifecycleState, OfflineWorker};
