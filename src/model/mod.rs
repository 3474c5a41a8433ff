pub mod common;
pub mod entity;
pub mod errors;
pub mod events;
pub mod optional;
pub mod user;
pub mod user_context;

pub use common::*;
pub use entity::*;
pub use errors::*;
pub use events::*;
pub use optional::*;
pub use user::*;
pub use user_context::*;
