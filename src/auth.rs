use std::sync::Arc;

use crate::error::AuthError;
use crate::gateway::HttpGateway;
use crate::models::{LoginRequest, LoginResponse, OtpLoginRequest, User};
use crate::session::{Credentials, SessionStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Authenticated(User),
    /// a second factor is required, call `submit_otp`
    OtpRequired,
}

/// login / one-time code / logout transitions of the session
pub struct AuthService {
    gateway: Arc<HttpGateway>,
    session: Arc<SessionStore>,
}

impl AuthService {
    pub fn new(gateway: Arc<HttpGateway>) -> Self {
        let session = gateway.session().clone();
        Self { gateway, session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        tracing::debug!("Logging in as {}", username);
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: LoginResponse = self.gateway.post("/auth/login", &request).await?;

        if response.otp_required {
            self.session.await_otp(Credentials {
                username: request.username,
                password: request.password,
            });
            return Ok(LoginOutcome::OtpRequired);
        }

        let user = self.session.establish(&response)?;
        Ok(LoginOutcome::Authenticated(user))
    }

    pub async fn submit_otp(&self, code: &str) -> Result<User, AuthError> {
        let credentials = self
            .session
            .pending_credentials()
            .ok_or(AuthError::NoPendingLogin)?;
        tracing::debug!("Submitting one-time code for {}", credentials.username);

        let request = OtpLoginRequest {
            username: credentials.username,
            password: credentials.password,
            otp_code: code.trim().to_string(),
        };
        let response: LoginResponse = self.gateway.post("/auth/otp-login", &request).await?;
        Ok(self.session.establish(&response)?)
    }

    pub fn logout(&self) {
        tracing::info!("👋 Logging out");
        self.session.logout();
    }
}
