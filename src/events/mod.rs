pub mod domain_events;
pub mod publisher;

pub use domain_events::DomainEvent;
pub use publisher::{EventPublisher, EventSink, PublishError, PublishedEvent};
