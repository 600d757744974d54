pub mod callback;
pub mod oauth;
pub mod token;

pub use callback::{CallbackResult, CallbackServer};
pub use oauth::{ConsentLauncher, SystemBrowser, TokenManager};
pub use token::{Token, TokenKind};
