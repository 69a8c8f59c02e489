//! Screen-flow coordinators and the renderer-side transition observer.

mod core;
mod observer;

pub use self::core::{Coordinator, CoordinatorBuilder, FlowRoute};
pub use observer::{NullRendererHooks, PresentationState, RendererHooks, TransitionObserver};
