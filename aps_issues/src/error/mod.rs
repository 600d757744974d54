pub mod aps_error;

pub use aps_error::{ApsError, ApsResult, AuthFailure, ErrorKind};
