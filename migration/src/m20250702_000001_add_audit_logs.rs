use sea_orm_migration::prelude::*;

/// AuditLogs (追加式审计与幂等标记表)
#[derive(DeriveIden)]
enum AuditLogs {
    Table,
    Id,
    IdempotencyKey,
    Actor,
    Action,
    Target,
    Detail,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 将审计记录与幂等标记从 settings 键值表中拆分出来:
/// - settings 只保留有界的配置项
/// - 幂等检查依赖 idempotency_key 上的唯一索引, 并发重复发券时
///   只有一次插入能成功, 其余得到唯一冲突
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AuditLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuditLogs::IdempotencyKey)
                            .string_len(128)
                            .null(),
                    )
                    .col(ColumnDef::new(AuditLogs::Actor).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLogs::Action).string_len(64).not_null())
                    .col(ColumnDef::new(AuditLogs::Target).string_len(128).null())
                    .col(ColumnDef::new(AuditLogs::Detail).text().null())
                    .col(
                        ColumnDef::new(AuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_logs_idempotency_key")
                    .table(AuditLogs::Table)
                    .col(AuditLogs::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs::Table).to_owned())
            .await?;
        Ok(())
    }
}
