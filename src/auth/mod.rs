pub mod middleware;

pub use middleware::{credentials_match, require_admin};
