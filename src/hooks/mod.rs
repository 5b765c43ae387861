//! Hooks Module
//!
//! Lifecycle handler chains and the handler set the hooked cache invokes.

mod chain;
mod handlers;

// Re-export public types
pub use chain::{
    DeleteHandler, HandlerChain, KeyHandler, OnStartHandler, ShiftTtlHandler, StoreHandler,
};
pub use handlers::{default_on_start, Handlers};
