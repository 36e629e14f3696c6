//! Data models for sheetrun entities.

mod file;
mod message;
mod session;

pub use file::{FileEntry, FileSetRef, Language};
pub use message::{ClientEvent, ErrorKind, ServerEvent};
pub use session::{Session, SessionInfo, SessionState};
