//! Tag and access-grant resolution

mod resolver;

pub use resolver::{clean_tag_id, AccessDecision, AuthorizationReply, TagResolver};
