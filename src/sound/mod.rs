//! Sound range tracking and synchronized dispatch

pub mod dispatch;
pub mod logger;
pub mod range;
pub mod registry;
pub mod tracker;

pub use dispatch::{
    resolve_directives, Directive, FireEvent, PlayerPosition, SoundDispatchCoordinator,
};
pub use registry::SoundRegistry;
