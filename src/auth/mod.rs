mod claims;
pub(crate) mod extractors;

pub use claims::Claims;
pub use extractors::AuthUser;
