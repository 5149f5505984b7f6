mod identity_cache;
mod partition;

pub use identity_cache::IdentityCache;
