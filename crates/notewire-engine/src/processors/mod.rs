// Built-in processors

mod notifications;
mod realtime;
mod subscriptions;

pub use notifications::NotificationProcessor;
pub use realtime::RealtimeProcessor;
pub use subscriptions::SubscriptionProcessor;
