use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Draws {
    Table,
    DrawDate,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// draw_date 上的唯一索引:
/// 两个请求同时发现"没有待开奖轮次"并各自创建时, 只有一个插入成功,
/// 失败方重新查询最近的待开奖轮次即可。
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_draws_draw_date")
                    .table(Draws::Table)
                    .col(Draws::DrawDate)
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
                    .name("idx_draws_draw_date")
                    .table(Draws::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
