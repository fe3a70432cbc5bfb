pub mod platform;
pub mod scheduler;

pub use platform::{NotificationPlatform, TokioPlatform};
pub use scheduler::NotificationScheduler;
