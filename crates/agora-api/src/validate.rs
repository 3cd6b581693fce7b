//! Shape checks on request bodies. These run before any token is looked at.

use agora_types::api::{
    CreateCommunityRequest, CreateOfferRequest, JoinCommunityRequest, SendMessageRequest,
    SignInRequest, SignUpRequest,
};

use crate::error::{ApiError, ApiResult};

const MAX_TEXT_LEN: usize = 4000;
const MAX_NAME_LEN: usize = 64;
pub const MAX_PASSWORD_LEN: usize = 1024;

pub trait Validate {
    fn validate(&self) -> ApiResult<()>;
}

fn required(field: &str, value: &str, max: usize) -> ApiResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max {
        return Err(ApiError::Validation(format!("{} is too long", field)));
    }
    Ok(())
}

/// Passwords are taken verbatim: surrounding spaces count and nothing is trimmed.
/// Sign-up and sign-in share this rule so every stored password can be presented again.
fn password(value: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::Validation("password is required".into()));
    }
    if value.chars().count() > MAX_PASSWORD_LEN {
        return Err(ApiError::Validation("password is too long".into()));
    }
    Ok(())
}

fn email(value: &str) -> ApiResult<()> {
    required("email", value, 254)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ApiError::Validation("email is malformed".into())),
    }
}

impl Validate for SignUpRequest {
    fn validate(&self) -> ApiResult<()> {
        required("username", &self.username, MAX_NAME_LEN)?;
        email(&self.email)?;
        password(&self.password)
    }
}

impl Validate for SignInRequest {
    fn validate(&self) -> ApiResult<()> {
        required("email", &self.email, 254)?;
        password(&self.password)
    }
}

impl Validate for CreateCommunityRequest {
    fn validate(&self) -> ApiResult<()> {
        required("name", &self.name, MAX_NAME_LEN)?;
        required("country", &self.country, MAX_NAME_LEN)?;
        required("city", &self.city, MAX_NAME_LEN)
    }
}

impl Validate for JoinCommunityRequest {
    fn validate(&self) -> ApiResult<()> {
        required("user_token", &self.user_token, 4096)
    }
}

impl Validate for CreateOfferRequest {
    fn validate(&self) -> ApiResult<()> {
        required("title", &self.title, 200)?;
        required("description", &self.description, MAX_TEXT_LEN)?;
        required("user_token", &self.user_token, 4096)
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> ApiResult<()> {
        required("text", &self.text, MAX_TEXT_LEN)
    }
}
