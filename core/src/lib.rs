//! Background location capture core for WorldPaint.
//!
//! Raw platform fixes are normalized into [`LocationSample`]s, batched in a
//! [`SampleBuffer`], and folded into a durable ledger kept by a
//! [`DurableStore`]. The [`TrackingController`] owns the subscription
//! lifecycle and the forced flush on stop.

pub mod buffering;
pub mod prelude;
pub mod sample;
pub mod store;
pub mod telemetry;
pub mod tracking;

pub use buffering::{FlushOutcome, SampleBuffer};
pub use prelude::{BufferConfig, TrackingError, TrackingResult};
pub use sample::{LocationSample, RawLocationUpdate};
pub use store::{DurableStore, FileStore, MemoryStore, StoreError};
pub use tracking::{LocationPlatform, TrackingController, TrackingState};
