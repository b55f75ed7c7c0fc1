//! Remote endpoints consumed by the session coordinator.

use url::Url;

/// An authentication or user endpoint, relative to the configured base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Register,
    Login,
    RefreshToken,
    ForgotPassword,
    ResetPassword,
    ChangePassword,
    UserData,
    Logout,
}

impl Endpoint {
    /// Path of the endpoint, without a leading slash.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Register => "api/auth/register",
            Endpoint::Login => "api/auth/login",
            Endpoint::RefreshToken => "api/auth/refresh-token",
            Endpoint::ForgotPassword => "api/auth/forgot-password",
            Endpoint::ResetPassword => "api/auth/reset-password",
            Endpoint::ChangePassword => "api/user/change-password",
            Endpoint::UserData => "api/user/data",
            Endpoint::Logout => "api/user/logout",
        }
    }

    /// Join this endpoint onto `base`, keeping any path the base already has.
    ///
    /// `https://host/app` and `https://host/app/` both resolve `Login` to
    /// `https://host/app/api/auth/login`.
    pub fn url(self, base: &Url) -> Result<Url, url::ParseError> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(self.path())
    }
}
