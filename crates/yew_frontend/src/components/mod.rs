//! UI components

pub mod chat;
pub mod document;
pub mod sidebar;
