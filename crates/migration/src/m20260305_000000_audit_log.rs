use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
}

#[derive(Iden)]
enum ExpenseAuditLog {
    Table,
    Id,
    ExpenseId,
    Seq,
    ActingUserId,
    Action,
    Changes,
    Timestamp,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExpenseAuditLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExpenseAuditLog::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ExpenseAuditLog::ExpenseId).string().not_null())
                    .col(ColumnDef::new(ExpenseAuditLog::Seq).big_integer().not_null())
                    .col(
                        ColumnDef::new(ExpenseAuditLog::ActingUserId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExpenseAuditLog::Action).string().not_null())
                    .col(ColumnDef::new(ExpenseAuditLog::Changes).text().not_null())
                    .col(
                        ColumnDef::new(ExpenseAuditLog::Timestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expense_audit_log-expense_id")
                            .from(ExpenseAuditLog::Table, ExpenseAuditLog::ExpenseId)
                            .to(Expenses::Table, Expenses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // (expense_id, seq) is the ordering key of an expense's history.
        manager
            .create_index(
                Index::create()
                    .name("uidx-expense_audit_log-expense_id-seq")
                    .table(ExpenseAuditLog::Table)
                    .col(ExpenseAuditLog::ExpenseId)
                    .col(ExpenseAuditLog::Seq)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uidx-expense_audit_log-expense_id-seq")
                    .table(ExpenseAuditLog::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ExpenseAuditLog::Table).to_owned())
            .await?;
        Ok(())
    }
}
