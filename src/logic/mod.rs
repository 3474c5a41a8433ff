pub mod mapping;
pub mod pipeline;
pub mod results;
pub mod user_mapping;
pub mod users;

pub use mapping::{apply_command, map_command, CommandId, FieldRules, FromCommand};
pub use pipeline::*;
pub use results::*;
pub use users::*;
