pub mod controller;
pub mod platform;
mod pump;

pub use controller::{ActivityState, TrackingController, TrackingState};
pub use platform::{
    AccuracyTier, ActivityType, Delivery, DeliverySink, ForegroundNotice, LocationPlatform,
    PermissionStatus, PlatformError, SubscriptionConfig,
};
