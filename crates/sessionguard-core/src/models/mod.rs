//! Wire types exchanged with the authentication service.

pub mod credentials;
pub mod requests;

pub use credentials::CredentialPair;
pub(crate) use credentials::RefreshRequest;
pub use requests::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
    RegisterRequest, ResetPasswordRequest,
};
