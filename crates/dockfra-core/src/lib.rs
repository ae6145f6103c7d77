pub mod action;
pub mod api;
pub mod config;
pub mod devices;
pub mod diff;
pub mod form;
pub mod logstream;
pub mod panels;
pub mod session;
pub mod socket;
pub mod state;
pub mod text;
pub mod ticket;
pub mod widget;

// Re-export main types for convenience
pub use action::{Action, FormSnapshot, OutboundAction};
pub use api::WizardClient;
pub use config::Config;
pub use session::{BadgeTarget, Request, WizardSession};
pub use socket::{ActionSink, ServerEvent, SocketEvent, SocketHandle};
pub use state::{ChatMessage, ChatRole};
