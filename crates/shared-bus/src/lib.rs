//! # Shared Bus - Message Bus Between Landlord and Renters
//!
//! Two primitives, modelled on an AMQP-style broker:
//!
//! - **Work queues** (PUSH / WORKER): named, durable within the process,
//!   competing consumers, explicit acknowledgement. A delivery dropped
//!   without [`Delivery::ack`] goes back on its queue.
//! - **Topics** (PUBLISH / SUBSCRIBE): every live subscriber receives every
//!   message; nothing is retained for late subscribers.
//!
//! ```text
//! ┌──────────┐  push(work-x-NN)  ┌──────────────┐  consume  ┌──────────┐
//! │ Landlord │ ────────────────▶ │  Message Bus │ ────────▶ │  Renter  │
//! │          │ ◀──────────────── │              │ ◀──────── │          │
//! └──────────┘  subscribe(topic) └──────────────┘  publish  └──────────┘
//! ```
//!
//! Payloads are opaque bytes; the JSON envelope lives in `shared-types`.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod publisher;
pub mod queue;
pub mod subscriber;

pub use error::BusError;
pub use publisher::{InMemoryMessageBus, MessageBus};
pub use queue::{Delivery, WorkConsumer};
pub use subscriber::{TopicStream, TopicSubscription};

/// Topic renters publish completions on.
pub const DEFAULT_RESULT_TOPIC: &str = "work.close";

/// Messages buffered per topic subscriber before the slowest one lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
