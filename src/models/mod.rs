pub mod availability;
pub mod booking;
pub mod catalog;
pub mod event;
pub mod no_show;
pub mod policy;

pub use availability::AvailabilityWindow;
pub use booking::{Actor, Booking, BookingStatus, Cancellation};
pub use catalog::{Lifecycle, Professional, Service};
pub use event::{LifecycleEvent, LifecycleEventType};
pub use no_show::NoShowConfig;
pub use policy::{BoundaryRule, CancellationPolicy, FeeRate, FeeTier};
