use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload as issued by the external identity provider. This service
/// only verifies tokens; it never mints them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}
