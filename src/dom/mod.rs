pub mod document;
pub mod html;
pub mod markup;
pub mod selector;

pub use document::{Document, MutationRecord, NodeId, Page, Rect, Viewport};
pub use selector::Selector;
