//! ABOUTME: Typed lifecycle event stream for the lacquer workflow engine
//! ABOUTME: A single-producer-multi-consumer EventBus carrying WorkflowEvent, with pattern subscriptions

pub mod bus;
pub mod event;
pub mod pattern;

pub use bus::{EventBus, EventSubscription, SubscriptionError};
pub use event::WorkflowEvent;
pub use pattern::EventPattern;
