//! The interactive controller: one [`Session`] per open portfolio.

mod notice;
mod session;

pub use notice::{Notice, NoticeKind};
pub use session::{Session, SessionBuilder};
