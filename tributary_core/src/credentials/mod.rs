pub mod cipher;
pub mod refresher;
pub mod resolver;
pub mod schema;
pub mod traits;

pub use cipher::{AesGcmCipher, PlaintextCipher};
pub use refresher::{DEFAULT_REFRESH_TIMEOUT, HttpTokenRefresher};
pub use resolver::CredentialResolver;
pub use schema::SerdeSchema;
pub use traits::{CredentialCipher, CredentialSchema, TokenRefresher, TokenResponse};
