pub mod env;

pub use env::{ApsConfig, Credentials};
