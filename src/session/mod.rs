//! 会话层
//!
//! 批次请求的进度与结果，以及带 TTL 清理的内存存储

pub mod model;
pub mod store;

pub use model::{next_session_id, Session, SessionStatus};
pub use store::{SessionHandle, SessionStore};
