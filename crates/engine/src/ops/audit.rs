use uuid::Uuid;

use crate::{AuditEntry, Capability, ResultEngine, authorize};

use super::{Engine, store};

impl Engine {
    /// Full history of one expense, oldest first.
    pub async fn audit_trail(&self, expense_id: Uuid, user_id: &str) -> ResultEngine<Vec<AuditEntry>> {
        let actor = self.actor(&self.database, user_id).await?;
        let expense = store::load_expense(&self.database, expense_id).await?;
        authorize(&actor, &expense.submitted_by, Capability::Read)?;
        store::list_audit(&self.database, expense_id).await
    }
}
