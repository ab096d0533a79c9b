pub mod dispatcher;
pub mod error;
pub mod models;
pub mod queue;
pub mod registry;
pub mod runtime;
pub mod senders;

pub use dispatcher::EventDispatcher;
pub use error::NotificationError;
pub use queue::QueueSettings;
pub use registry::NotifierRegistry;
