//! Tether bus: in-process pub/sub, scheduling and worker pooling
//!
//! Key design principles:
//! - Values travel as `tether_data::Data` handles; publishing shares, it
//!   never copies
//! - The scheduler owns exactly one timer thread; execution happens on
//!   worker pools (or ad-hoc threads), never on the timer thread
//! - Components expose factory records so an external container can
//!   assemble a scheduler, pool and bus from configuration maps

pub mod bus;
pub mod component;
pub mod config;
pub mod pool;
pub mod scheduler;

// Re-export key types
pub use bus::{Bus, PubCallback, Publisher, SubCallback, Subscriber, topic_matches};
pub use component::{
    Category, ComponentFactory, ComponentRef, ComponentResolver, ComponentState, NoComponents,
};
pub use pool::{Job, ThreadPool, WorkerPool};
pub use scheduler::{Schedule, Scheduler};
