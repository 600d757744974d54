// Handlers HTTP do front end web
pub mod auth;
pub mod export;
pub mod health;
pub mod page;
pub mod resources;

pub use auth::*;
pub use export::*;
pub use health::*;
pub use page::*;
pub use resources::*;
