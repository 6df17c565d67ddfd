pub mod photo;
pub mod whitelist;
pub mod whitelist_token;

pub use photo::Photo;
pub use whitelist::{
    ListQuery, ModerationAction, NewWhitelist, SortBy, StageFilter, VerificationStage, Whitelist,
    WhitelistForm, WhitelistListRow,
};
pub use whitelist_token::{token_ttl, WhitelistToken, TOKEN_TTL_DAYS};
