//! Display pipeline for chat messages: free text is parsed into blocks, and
//! structured payloads are laid out in fixed sections.

pub mod blocks;
pub mod inline;
pub mod render;

pub use blocks::{BlockNode, BulletItem, OrderedItem, parse};
pub use inline::{InlineSpan, tokenize};
pub use render::{ListSection, RenderNode, RenderTree, render};
