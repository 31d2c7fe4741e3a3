mod buffer;
mod logic_page;
mod viewport;

pub use buffer::{total_locks, Backing, GraphicBuffer, StorageKind, NOT_LOCKED};
pub use logic_page::{LogicPage, LogicPageGuard};
pub use viewport::Viewport;
