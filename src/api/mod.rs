pub mod handlers;
pub mod problem;
pub mod routes;
pub mod user_extractor;

pub use handlers::*;
pub use problem::*;
pub use routes::*;
