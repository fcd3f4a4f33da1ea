//! Tenant and acting user from request headers

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use shared::CompanyId;

use crate::error::AppError;

pub const COMPANY_HEADER: &str = "x-company-id";
pub const USER_HEADER: &str = "x-user-id";

/// The company a request acts on, and who is acting
#[derive(Debug, Clone)]
pub struct Tenant {
    pub company: CompanyId,
    pub user: Option<String>,
}

impl Tenant {
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let company = header(parts, COMPANY_HEADER)
            .ok_or_else(|| AppError::BadRequest("missing X-Company-Id header".to_string()))?;
        Ok(Self {
            company: CompanyId::new(company),
            user: header(parts, USER_HEADER),
        })
    }
}
