//! Single authorization decision point. Every mutating handler asks this
//! module instead of branching on the role inline, so the whole access
//! matrix lives in one match.

use uuid::Uuid;

use crate::{error::ApiError, middleware::CurrentUser};

/// What the caller is trying to do. Expense actions carry the record's
/// owner so ownership is part of the decision, not a handler afterthought.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    CreateExpense,
    ViewExpense { owner: Uuid },
    UpdateExpense { owner: Uuid },
    DeleteExpense { owner: Uuid },
    /// Approve or reject submitted expenses.
    ReviewExpenses,
    ManageTasks,
    ManageBudget,
    ManageUsers,
    ViewAdminDashboard,
}

pub fn authorize(actor: &CurrentUser, action: Action) -> Result<(), ApiError> {
    if actor.is_admin() {
        return Ok(());
    }

    match action {
        Action::CreateExpense => Ok(()),
        Action::ViewExpense { owner } if owner == actor.id => Ok(()),
        Action::UpdateExpense { owner } if owner == actor.id => Ok(()),
        Action::DeleteExpense { owner } if owner == actor.id => Ok(()),
        Action::ViewExpense { .. } => Err(ApiError::Forbidden(
            "Not authorized to view this expense".to_string(),
        )),
        Action::UpdateExpense { .. } => Err(ApiError::Forbidden(
            "Not authorized to update this expense".to_string(),
        )),
        Action::DeleteExpense { .. } => Err(ApiError::Forbidden(
            "Not authorized to delete this expense".to_string(),
        )),
        Action::ReviewExpenses
        | Action::ManageTasks
        | Action::ManageBudget
        | Action::ManageUsers
        | Action::ViewAdminDashboard => {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn actor(role: Role) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            mobile: "9876543210".to_string(),
            role,
        }
    }

    #[test]
    fn admin_is_allowed_everything() {
        let admin = actor(Role::Admin);
        let other = Uuid::new_v4();

        for action in [
            Action::CreateExpense,
            Action::ViewExpense { owner: other },
            Action::UpdateExpense { owner: other },
            Action::DeleteExpense { owner: other },
            Action::ReviewExpenses,
            Action::ManageTasks,
            Action::ManageBudget,
            Action::ManageUsers,
            Action::ViewAdminDashboard,
        ] {
            assert!(authorize(&admin, action).is_ok());
        }
    }

    #[test]
    fn user_may_create_expenses() {
        assert!(authorize(&actor(Role::User), Action::CreateExpense).is_ok());
    }

    #[test]
    fn user_may_touch_only_own_expenses() {
        let user = actor(Role::User);
        let stranger = Uuid::new_v4();

        assert!(authorize(&user, Action::ViewExpense { owner: user.id }).is_ok());
        assert!(authorize(&user, Action::UpdateExpense { owner: user.id }).is_ok());
        assert!(authorize(&user, Action::DeleteExpense { owner: user.id }).is_ok());

        assert!(authorize(&user, Action::ViewExpense { owner: stranger }).is_err());
        assert!(authorize(&user, Action::UpdateExpense { owner: stranger }).is_err());
        assert!(authorize(&user, Action::DeleteExpense { owner: stranger }).is_err());
    }

    #[test]
    fn admin_gates_deny_plain_users() {
        let user = actor(Role::User);

        for action in [
            Action::ReviewExpenses,
            Action::ManageTasks,
            Action::ManageBudget,
            Action::ManageUsers,
            Action::ViewAdminDashboard,
        ] {
            let err = authorize(&user, action).unwrap_err();
            assert_eq!(
                err.status_code(),
                axum::http::StatusCode::FORBIDDEN,
                "{action:?} should be forbidden"
            );
        }
    }
}
