pub mod catalog;
pub mod models;

pub use catalog::AuthCatalog;
pub use models::{
    AuthStrategy, AuthType, AuthenticatedCredential, ClientCredentialLocation, CredentialFields,
    OAuth2Settings, SigV4Settings, TrelloAuthSettings,
};
