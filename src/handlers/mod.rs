pub mod admin_handlers;
pub mod whitelist_handlers;

pub use admin_handlers::{
    accept_whitelist, basic_auth_check, decline_whitelist, list_whitelists, question_whitelist,
};
pub use whitelist_handlers::{confirm_email, register};
