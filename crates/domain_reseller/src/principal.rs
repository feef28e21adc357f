//! Authenticated actors
//!
//! Only resellers and their employees hold prepaid balances. Every other
//! role recharges customers without touching a balance.

use serde::{Deserialize, Serialize};

use core_kernel::{CompanyId, UserId};

use crate::transfer::TransferType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Operator,
    Reseller,
    ResellerEmployee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Operator => "operator",
            Role::Reseller => "reseller",
            Role::ResellerEmployee => "reseller_employee",
        }
    }

    /// Roles that may fund balances and run payouts
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin | Role::Manager)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "operator" => Ok(Role::Operator),
            "reseller" => Ok(Role::Reseller),
            "reseller_employee" => Ok(Role::ResellerEmployee),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The user a request acts as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub company_id: Option<CompanyId>,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: UserId, company_id: Option<CompanyId>, role: Role) -> Self {
        Self {
            user_id,
            company_id,
            role,
        }
    }

    /// The transfer type a recharge by this principal is recorded under,
    /// or `None` if the principal holds no balance
    pub fn recharge_transfer_type(&self) -> Option<TransferType> {
        match self.role {
            Role::Reseller => Some(TransferType::ResellerRecharge),
            Role::ResellerEmployee => Some(TransferType::EmployeeRecharge),
            _ => None,
        }
    }

    pub fn holds_balance(&self) -> bool {
        self.recharge_transfer_type().is_some()
    }
}
