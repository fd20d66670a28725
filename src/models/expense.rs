use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "expense_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    /// Status a new expense starts in. Admin submissions bypass review.
    pub fn initial_for(role: Role) -> Self {
        match role {
            Role::Admin => ExpenseStatus::Approved,
            Role::User => ExpenseStatus::Pending,
        }
    }

    /// The one-way lifecycle: pending may become approved or rejected,
    /// nothing leaves a terminal state.
    pub fn can_transition_to(self, next: ExpenseStatus) -> bool {
        matches!(
            (self, next),
            (ExpenseStatus::Pending, ExpenseStatus::Approved)
                | (ExpenseStatus::Pending, ExpenseStatus::Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        self != ExpenseStatus::Pending
    }
}

impl FromStr for ExpenseStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExpenseStatus::Pending),
            "approved" => Ok(ExpenseStatus::Approved),
            "rejected" => Ok(ExpenseStatus::Rejected),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub task_id: Uuid,
    pub description: Option<String>,
    pub amount: Decimal,
    #[serde(rename = "date")]
    pub expense_date: NaiveDate,
    pub submitted_by: Uuid,
    pub receipt_url: Option<String>,
    pub status: ExpenseStatus,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Field edits are allowed only while the expense awaits review.
    pub fn is_editable(&self) -> bool {
        self.status == ExpenseStatus::Pending
    }

    /// Approved amounts are part of the budget history and cannot be
    /// removed; pending and rejected records can.
    pub fn is_deletable(&self) -> bool {
        self.status != ExpenseStatus::Approved
    }
}

/// Expense joined with its task and submitter for API responses.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseDetail {
    pub id: Uuid,
    pub task_id: Uuid,
    pub task_name: String,
    pub task_estimated_cost: Decimal,
    pub description: Option<String>,
    pub amount: Decimal,
    #[serde(rename = "date")]
    pub expense_date: NaiveDate,
    pub submitted_by: Uuid,
    pub submitter_mobile: String,
    pub submitter_role: Role,
    pub receipt_url: Option<String>,
    pub status: ExpenseStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn expense_with_status(status: ExpenseStatus) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            description: None,
            amount: dec!(50),
            expense_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            submitted_by: Uuid::new_v4(),
            receipt_url: None,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn pending_can_become_approved_or_rejected() {
        assert!(ExpenseStatus::Pending.can_transition_to(ExpenseStatus::Approved));
        assert!(ExpenseStatus::Pending.can_transition_to(ExpenseStatus::Rejected));
    }

    #[test]
    fn terminal_states_admit_no_transition() {
        for terminal in [ExpenseStatus::Approved, ExpenseStatus::Rejected] {
            assert!(terminal.is_terminal());
            for next in [
                ExpenseStatus::Pending,
                ExpenseStatus::Approved,
                ExpenseStatus::Rejected,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_is_not_a_transition_target() {
        assert!(!ExpenseStatus::Pending.can_transition_to(ExpenseStatus::Pending));
    }

    #[test]
    fn admin_submissions_start_approved() {
        assert_eq!(
            ExpenseStatus::initial_for(Role::Admin),
            ExpenseStatus::Approved
        );
        assert_eq!(
            ExpenseStatus::initial_for(Role::User),
            ExpenseStatus::Pending
        );
    }

    #[test]
    fn only_pending_expenses_are_editable() {
        assert!(expense_with_status(ExpenseStatus::Pending).is_editable());
        assert!(!expense_with_status(ExpenseStatus::Approved).is_editable());
        assert!(!expense_with_status(ExpenseStatus::Rejected).is_editable());
    }

    #[test]
    fn approved_expenses_are_not_deletable() {
        assert!(expense_with_status(ExpenseStatus::Pending).is_deletable());
        assert!(expense_with_status(ExpenseStatus::Rejected).is_deletable());
        assert!(!expense_with_status(ExpenseStatus::Approved).is_deletable());
    }

    #[test]
    fn status_parses_from_wire_values() {
        assert_eq!(
            "approved".parse::<ExpenseStatus>(),
            Ok(ExpenseStatus::Approved)
        );
        assert_eq!(
            "rejected".parse::<ExpenseStatus>(),
            Ok(ExpenseStatus::Rejected)
        );
        assert_eq!(
            "pending".parse::<ExpenseStatus>(),
            Ok(ExpenseStatus::Pending)
        );
        assert!("denied".parse::<ExpenseStatus>().is_err());
        assert!("Approved".parse::<ExpenseStatus>().is_err());
    }
}
