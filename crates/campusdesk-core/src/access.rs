use crate::error::CoreError;
use campusdesk_models::role::{Capabilities, Principal, Role};

/// Fail with `Unauthorized` unless the principal's role grants `required`.
pub fn require_capability(
    principal: &Principal,
    required: Capabilities,
    action: &str,
) -> Result<(), CoreError> {
    if !principal.capabilities().contains(required) {
        return Err(CoreError::Unauthorized(format!(
            "role {} may not {action}",
            principal.role
        )));
    }
    Ok(())
}

/// Students may read their own records; staff may read anyone's.
pub fn require_student_access(principal: &Principal, student_id: &str) -> Result<(), CoreError> {
    if principal
        .capabilities()
        .contains(Capabilities::VIEW_ANY_STUDENT)
    {
        return Ok(());
    }
    if principal.role == Role::Student && principal.user_id == student_id {
        return Ok(());
    }
    Err(CoreError::Unauthorized(format!(
        "{} {} may not read records of student {student_id}",
        principal.role, principal.user_id
    )))
}
