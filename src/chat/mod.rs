pub mod service;
pub mod session;

pub use service::{ChatOutcome, ChatService, LoginOutcome};
pub use session::{Session, SessionHandle, SessionStore};
