//! Authenticated session: credentials, identity, and the resolver that owns them.

pub mod model;
pub mod resolver;

pub use model::{Credentials, ScreenId, Session, StoredToken, UserIdentity};
pub use resolver::SessionResolver;
