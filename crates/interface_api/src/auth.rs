//! Authentication and authorization
//!
//! Tokens carry the user, their company (absent for super-admins) and one
//! role. Issuing tokens belongs to the login flow elsewhere; `create_token`
//! exists for operators' tooling and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::{CompanyId, TenantContext};
use domain_reseller::{Principal, Role};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Owning company, absent for super-admins
    pub company_id: Option<Uuid>,
    pub role: Role,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.sub.into(), self.company_id.map(CompanyId::from), self.role)
    }
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Role {0} may not perform this action")]
    MissingRole(&'static str),
    #[error("User belongs to a different company")]
    WrongCompany,
}

/// Creates a signed token for `principal`
pub fn create_token(principal: &Principal, secret: &str, expiration_secs: u64) -> Result<String, AuthError> {
    let now = Utc::now();
    let lifetime = i64::try_from(expiration_secs).map_err(|_| AuthError::InvalidToken)?;
    let exp = now + Duration::seconds(lifetime);

    let claims = Claims {
        sub: principal.user_id.into_uuid(),
        company_id: principal.company_id.map(CompanyId::into_uuid),
        role: principal.role,
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Checks that the principal may act in the resolved tenant
///
/// Super-admins act anywhere. Everyone else must belong to the tenant the
/// host resolved to, and may not use the super-admin host.
pub fn authorize_tenant(principal: &Principal, ctx: &TenantContext) -> Result<(), AuthError> {
    if principal.role == Role::SuperAdmin {
        return Ok(());
    }
    match ctx {
        TenantContext::Tenant(company_id) if principal.company_id == Some(*company_id) => Ok(()),
        _ => Err(AuthError::WrongCompany),
    }
}

/// Requires an administrative role (super-admin, admin, manager)
pub fn require_admin(principal: &Principal) -> Result<(), AuthError> {
    if principal.role.is_admin() {
        Ok(())
    } else {
        Err(AuthError::MissingRole(principal.role.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::UserId;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip_keeps_principal() {
        let principal = Principal::new(UserId::new(), Some(CompanyId::new()), Role::Reseller);
        let token = create_token(&principal, SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.principal(), principal);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let principal = Principal::new(UserId::new(), None, Role::SuperAdmin);
        let token = create_token(&principal, SECRET, 60).unwrap();
        assert!(matches!(validate_token(&token, "other"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_tenant_membership() {
        let company = CompanyId::new();
        let ctx = TenantContext::tenant(company);
        let member = Principal::new(UserId::new(), Some(company), Role::Operator);
        let outsider = Principal::new(UserId::new(), Some(CompanyId::new()), Role::Admin);
        let root = Principal::new(UserId::new(), None, Role::SuperAdmin);

        assert!(authorize_tenant(&member, &ctx).is_ok());
        assert!(authorize_tenant(&outsider, &ctx).is_err());
        assert!(authorize_tenant(&root, &ctx).is_ok());
        assert!(authorize_tenant(&member, &TenantContext::super_admin()).is_err());
    }

    #[test]
    fn test_require_admin() {
        let company = Some(CompanyId::new());
        assert!(require_admin(&Principal::new(UserId::new(), company, Role::Manager)).is_ok());
        assert!(require_admin(&Principal::new(UserId::new(), company, Role::Reseller)).is_err());
    }
}
