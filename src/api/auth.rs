use crate::api::client::ApiClient;
use crate::api::models::AuthTokens;
use crate::config::Session;
use crate::error::{ApiError, Result};
use serde_json::json;

#[derive(Clone)]
pub struct AuthApi {
    client: ApiClient,
    session: Session,
}

impl AuthApi {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    /// Logs in and makes the returned identity the session's.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthTokens> {
        require("Email", email)?;
        require("Password", password)?;
        let req = self
            .client
            .post("/auth/login", &self.session)
            .json(&json!({ "email": email.trim(), "password": password }));
        let tokens: AuthTokens = self.client.send(req, &self.session).await?;
        self.session.establish(tokens.access_token.clone(), tokens.user.clone());
        log::info!("logged in as {}", tokens.user.email);
        Ok(tokens)
    }

    pub async fn forget_password(&self, email: &str) -> Result<String> {
        require("Email", email)?;
        let req = self
            .client
            .post("/auth/forget-password", &self.session)
            .json(&json!({ "email": email.trim() }));
        self.client.send_ack(req, &self.session).await
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<String> {
        require("OTP", otp)?;
        let req = self
            .client
            .post("/auth/verify-otp", &self.session)
            .json(&json!({ "email": email.trim(), "otp": otp.trim() }));
        self.client.send_ack(req, &self.session).await
    }

    pub async fn reset_password(&self, email: &str, otp: &str, new_password: &str, confirm: &str) -> Result<String> {
        check_new_password(new_password, confirm)?;
        let req = self
            .client
            .post("/auth/reset-password", &self.session)
            .json(&json!({ "email": email.trim(), "otp": otp.trim(), "newPassword": new_password }));
        self.client.send_ack(req, &self.session).await
    }

    pub async fn change_password(&self, current: &str, new_password: &str, confirm: &str) -> Result<String> {
        require("Current password", current)?;
        check_new_password(new_password, confirm)?;
        let req = self
            .client
            .post("/user/change-password", &self.session)
            .json(&json!({ "currentPassword": current, "newPassword": new_password }));
        self.client.send_ack(req, &self.session).await
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn check_new_password(new_password: &str, confirm: &str) -> Result<()> {
    require("New password", new_password)?;
    if new_password != confirm {
        return Err(ApiError::validation("Passwords do not match"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetStep {
    Email,
    Otp { email: String },
    Reset { email: String, otp: String },
    Done,
}

/// Forgot-password wizard. Each step only advances when the backend
/// accepted the previous one.
#[derive(Debug, Clone)]
pub struct ResetFlow {
    step: ResetStep,
}

impl Default for ResetFlow {
    fn default() -> Self {
        Self { step: ResetStep::Email }
    }
}

impl ResetFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> &ResetStep {
        &self.step
    }

    pub async fn request_code(&mut self, api: &AuthApi, email: &str) -> Result<()> {
        if self.step != ResetStep::Email {
            return Err(ApiError::validation("A code was already requested"));
        }
        api.forget_password(email).await?;
        self.step = ResetStep::Otp { email: email.trim().to_string() };
        Ok(())
    }

    pub async fn verify(&mut self, api: &AuthApi, otp: &str) -> Result<()> {
        let ResetStep::Otp { email } = &self.step else {
            return Err(ApiError::validation("Request a code first"));
        };
        api.verify_otp(email, otp).await?;
        self.step = ResetStep::Reset { email: email.clone(), otp: otp.trim().to_string() };
        Ok(())
    }

    pub async fn reset(&mut self, api: &AuthApi, new_password: &str, confirm: &str) -> Result<()> {
        let ResetStep::Reset { email, otp } = &self.step else {
            return Err(ApiError::validation("Verify the code first"));
        };
        api.reset_password(email, otp, new_password, confirm).await?;
        self.step = ResetStep::Done;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_passwords_are_rejected_locally() {
        let err = check_new_password("hunter22", "hunter23").unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
        assert!(matches!(check_new_password(" ", " "), Err(ApiError::Validation(_))));
        assert!(check_new_password("hunter22", "hunter22").is_ok());
    }

    #[tokio::test]
    async fn reset_flow_refuses_to_skip_steps() {
        let api = AuthApi::new(ApiClient::new("http://127.0.0.1:9").unwrap(), Session::default());
        let mut flow = ResetFlow::new();
        assert!(matches!(flow.verify(&api, "1234").await, Err(ApiError::Validation(_))));
        assert!(matches!(flow.reset(&api, "a", "a").await, Err(ApiError::Validation(_))));
        assert_eq!(flow.step(), &ResetStep::Email);
    }
}
