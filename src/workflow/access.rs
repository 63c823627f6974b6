/// Visibility-based access control evaluator
///
/// A single pure decision function shared by every gate in the system. It
/// never performs I/O and never mutates anything; callers fetch the workflow
/// record first and hand it in.

use crate::workflow::types::{Visibility, Workflow};

/// Decide whether `requester_id` may perform an operation on `workflow`
///
/// `destructive` marks write intent (update, delete, structure sync) as
/// opposed to plain reads. The rules:
/// - the owner may do anything;
/// - non-owners may read `public` and `readonly` workflows;
/// - non-owners may write only `public` workflows — `readonly` is readable
///   but never writable by anyone except the owner;
/// - `private` workflows are invisible to non-owners entirely.
pub fn check_access(workflow: &Workflow, requester_id: &str, destructive: bool) -> bool {
    if workflow.user_id == requester_id {
        return true;
    }
    match workflow.visibility {
        Visibility::Private => false,
        Visibility::Public => true,
        Visibility::Readonly => !destructive,
    }
}
