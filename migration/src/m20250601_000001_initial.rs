use sea_orm_migration::prelude::*;

/// Users (用户账户与两项冗余计数器)
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Phone,
    Username,
    Email,
    ReferralCode,
    ReferrerId,
    AvailableTickets,
    TotalTicketsEarned,
    HasWon,
    IsBlocked,
    IsAdmin,
    CreatedAt,
    UpdatedAt,
}

/// Tickets (单张奖券, 账本的原始事实)
#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    UserId,
    Source,
    IsUsed,
    DrawId,
    ConfirmationCode,
    CreatedAt,
}

/// Draws (每周一期的开奖轮次)
#[derive(DeriveIden)]
enum Draws {
    Table,
    Id,
    DrawDate,
    Status,
    PrizePaise,
    TotalTickets,
    WinnerId,
    CreatedAt,
    UpdatedAt,
}

/// DrawParticipations (用户在某一期投入的奖券数)
#[derive(DeriveIden)]
enum DrawParticipations {
    Table,
    Id,
    UserId,
    DrawId,
    TicketsUsed,
    IsWinner,
    CreatedAt,
    UpdatedAt,
}

/// Winners (历史中奖记录)
#[derive(DeriveIden)]
enum Winners {
    Table,
    Id,
    UserId,
    DrawId,
    TicketCount,
    PrizePaise,
    Claimed,
    CouponCode,
    DrawDate,
    CreatedAt,
    UpdatedAt,
}

/// Settings (有界的配置键值表, 仅存少量配置项)
#[derive(DeriveIden)]
enum Settings {
    Table,
    Key,
    Value,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

/// 初始结构:
/// - 计数器 (available_tickets / total_tickets_earned / total_tickets) 是
///   tickets 表的冗余缓存, tickets 表才是事实来源
/// - 金额统一使用 paise (1 卢比 = 100 paise)
/// - source / status 使用字符串枚举列, 取值由实体层约束
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 用户表
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Phone).string_len(20).not_null())
                    .col(ColumnDef::new(Users::Username).string_len(64).not_null())
                    .col(ColumnDef::new(Users::Email).string_len(128).null())
                    .col(ColumnDef::new(Users::ReferralCode).string_len(16).null())
                    .col(ColumnDef::new(Users::ReferrerId).big_integer().null())
                    .col(
                        ColumnDef::new(Users::AvailableTickets)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::TotalTicketsEarned)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Users::HasWon)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsBlocked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsAdmin)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_referral_code")
                    .table(Users::Table)
                    .col(Users::ReferralCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 奖券表
        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tickets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tickets::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::Source).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Tickets::IsUsed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Tickets::DrawId).big_integer().null())
                    .col(
                        ColumnDef::new(Tickets::ConfirmationCode)
                            .string_len(40)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tickets::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_user_used")
                    .table(Tickets::Table)
                    .col(Tickets::UserId)
                    .col(Tickets::IsUsed)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_draw")
                    .table(Tickets::Table)
                    .col(Tickets::DrawId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_tickets_confirmation_code")
                    .table(Tickets::Table)
                    .col(Tickets::ConfirmationCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 开奖轮次表
        manager
            .create_table(
                Table::create()
                    .table(Draws::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Draws::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Draws::DrawDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Draws::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Draws::PrizePaise).big_integer().not_null())
                    .col(
                        ColumnDef::new(Draws::TotalTickets)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Draws::WinnerId).big_integer().null())
                    .col(
                        ColumnDef::new(Draws::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Draws::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 参与表, (user_id, draw_id) 唯一
        manager
            .create_table(
                Table::create()
                    .table(DrawParticipations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DrawParticipations::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DrawParticipations::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DrawParticipations::DrawId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DrawParticipations::TicketsUsed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DrawParticipations::IsWinner)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(DrawParticipations::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(DrawParticipations::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_participations_user_draw")
                    .table(DrawParticipations::Table)
                    .col(DrawParticipations::UserId)
                    .col(DrawParticipations::DrawId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 中奖历史表
        manager
            .create_table(
                Table::create()
                    .table(Winners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Winners::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Winners::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Winners::DrawId).big_integer().not_null())
                    .col(ColumnDef::new(Winners::TicketCount).big_integer().not_null())
                    .col(ColumnDef::new(Winners::PrizePaise).big_integer().not_null())
                    .col(
                        ColumnDef::new(Winners::Claimed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Winners::CouponCode).string_len(64).null())
                    .col(
                        ColumnDef::new(Winners::DrawDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Winners::CreatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Winners::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // 配置键值表
        manager
            .create_table(
                Table::create()
                    .table(Settings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Settings::Key)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Settings::Value).text().not_null())
                    .col(
                        ColumnDef::new(Settings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Settings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Winners::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DrawParticipations::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Draws::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tickets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
