//! Loan application models and the read projections built from them

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::amortization::{monthly_payment, AmortizationError};
use super::error::ApplicationError;

/// Key identifying which user a loan application belongs to.
///
/// A deployment uses exactly one canonical key (see [`OwnerKey`]); the value
/// is stored verbatim in the `owner_ref` column.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct OwnerRef(String);

impl OwnerRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which user-profile field acts as the owner reference in this deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerKey {
    #[default]
    Email,
    IdNumber,
}

impl OwnerKey {
    /// Resolve the owner reference of a profile under this key
    pub fn owner_ref_of(&self, profile: &UserProfile) -> OwnerRef {
        match self {
            OwnerKey::Email => OwnerRef::new(profile.email.clone()),
            OwnerKey::IdNumber => OwnerRef::new(profile.id_number.to_string()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKey::Email => "email",
            OwnerKey::IdNumber => "id_number",
        }
    }
}

/// Bearer token presented by the caller, forwarded to the identity service
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(****)")
    }
}

/// Roles known to the identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Cliente,
    Asesor,
    Admin,
}

/// User profile owned by the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id_number: i64,
    pub email: String,
    pub name: String,
    pub last_name: String,
    pub base_salary: Decimal,
    pub role: Role,
    pub document_type: String,
}

/// Loan application row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub application_id: Uuid,
    pub owner_ref: OwnerRef,
    pub loan_amount: Decimal,
    pub loan_term: Decimal,
    pub loan_type_id: i32,
    pub loan_status_id: i32,
}

/// Loan type reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanType {
    pub loan_type_id: i32,
    pub name: String,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Annual rate in percent, 5.0 meaning 5%
    pub interest_rate: Decimal,
    pub auto_validation: bool,
}

/// Loan status reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanStatus {
    pub loan_status_id: i32,
    pub name: String,
    pub description: String,
}

/// Command to file a new application
#[derive(Debug, Clone, PartialEq)]
pub struct CreateApplication {
    pub owner_ref: OwnerRef,
    pub loan_amount: Decimal,
    pub loan_term: Decimal,
    pub loan_type_id: i32,
}

impl CreateApplication {
    /// Shape checks that need no collaborator
    pub fn validate(&self) -> Result<(), ApplicationError> {
        if self.owner_ref.is_blank() {
            return Err(ApplicationError::InvalidData(
                "owner reference must not be empty".to_string(),
            ));
        }
        if self.loan_amount <= Decimal::ZERO {
            return Err(ApplicationError::InvalidData(
                "loan amount must be greater than 0".to_string(),
            ));
        }
        if self.loan_term <= Decimal::ZERO {
            return Err(ApplicationError::InvalidData(
                "loan term must be greater than 0".to_string(),
            ));
        }
        if self.loan_type_id < 1 {
            return Err(ApplicationError::InvalidData(format!(
                "invalid loan type id: {}",
                self.loan_type_id
            )));
        }
        Ok(())
    }
}

/// Command to move an application to another status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateApplicationStatus {
    pub application_id: Uuid,
    pub loan_status_id: i32,
}

/// Application joined with its loan type and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: Uuid,
    pub owner_ref: OwnerRef,
    pub loan_amount: Decimal,
    pub loan_term: Decimal,
    pub loan_type: LoanType,
    pub loan_status: LoanStatus,
}

impl ApplicationRecord {
    pub fn new(application: Application, loan_type: LoanType, loan_status: LoanStatus) -> Self {
        Self {
            application_id: application.application_id,
            owner_ref: application.owner_ref,
            loan_amount: application.loan_amount,
            loan_term: application.loan_term,
            loan_type,
            loan_status,
        }
    }
}

/// Application joined with reference data, the owner's profile and the
/// computed monthly payment. This is also the notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedApplicationRecord {
    pub application_id: Uuid,
    pub owner_ref: OwnerRef,
    pub id_number: i64,
    pub email: String,
    pub name: String,
    pub last_name: String,
    pub base_salary: Decimal,
    pub loan_amount: Decimal,
    pub loan_term: Decimal,
    pub loan_type: LoanType,
    pub loan_status: LoanStatus,
    pub monthly_payment: Decimal,
}

impl EnrichedApplicationRecord {
    /// Build the record once every reference has been resolved
    pub fn assemble(
        application: Application,
        loan_type: LoanType,
        loan_status: LoanStatus,
        owner: &UserProfile,
    ) -> Result<Self, AmortizationError> {
        let monthly_payment = monthly_payment(
            application.loan_amount,
            loan_type.interest_rate,
            application.loan_term,
        )?;

        Ok(Self {
            application_id: application.application_id,
            owner_ref: application.owner_ref,
            id_number: owner.id_number,
            email: owner.email.clone(),
            name: owner.name.clone(),
            last_name: owner.last_name.clone(),
            base_salary: owner.base_salary,
            loan_amount: application.loan_amount,
            loan_term: application.loan_term,
            loan_type,
            loan_status,
            monthly_payment,
        })
    }
}


#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_owner_key_resolves_profile_field() {
        let ana = profile("ana@example.com", Role::Cliente);
        assert_eq!(
            OwnerKey::Email.owner_ref_of(&ana),
            OwnerRef::new("ana@example.com")
        );
        assert_eq!(
            OwnerKey::IdNumber.owner_ref_of(&ana),
            OwnerRef::new(ana.id_number.to_string())
        );
    }

    #[test]
    fn test_auth_token_debug_is_redacted() {
        let token = AuthToken::new("secret-token");
        assert!(!format!("{:?}", token).contains("secret"));
        assert_eq!(token.expose(), "secret-token");
    }

    #[test]
    fn test_create_command_validation() {
        let valid = CreateApplication {
            owner_ref: OwnerRef::new("ana@example.com"),
            loan_amount: dec!(2500000),
            loan_term: dec!(24),
            loan_type_id: 1,
        };
        assert!(valid.validate().is_ok());

        let mut invalid = valid.clone();
        invalid.loan_amount = Decimal::ZERO;
        assert!(matches!(
            invalid.validate(),
            Err(ApplicationError::InvalidData(_))
        ));

        let mut invalid = valid.clone();
        invalid.loan_term = dec!(-1);
        assert!(invalid.validate().is_err());

        let mut invalid = valid.clone();
        invalid.owner_ref = OwnerRef::new("  ");
        assert!(invalid.validate().is_err());

        let mut invalid = valid;
        invalid.loan_type_id = 0;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_assemble_computes_monthly_payment() {
        let app = application("ana@example.com", 1, 1);
        let record = EnrichedApplicationRecord::assemble(
            app.clone(),
            loan_type(1, Decimal::ZERO),
            loan_status(1, "PENDING"),
            &profile("ana@example.com", Role::Cliente),
        )
        .unwrap();

        assert_eq!(record.application_id, app.application_id);
        assert_eq!(record.monthly_payment, dec!(83333.33));
        assert_eq!(record.email, "ana@example.com");
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_string(&Role::Asesor).unwrap(), "\"ASESOR\"");
        let role: Role = serde_json::from_str("\"CLIENTE\"").unwrap();
        assert_eq!(role, Role::Cliente);
    }
}
