//! 测试用内存数据库与种子数据。
//! 每个测试各建一个 sqlite 内存库并跑全量迁移,
//! 唯一索引/事务行为与真实库一致。

use crate::entities::{
    DrawStatus, TicketSource, draw_entity as draws, ticket_entity as tickets,
    user_entity as users,
};
use crate::utils::generate_confirmation_code;
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, Set};

/// 新建一个跑完全部迁移的内存库连接
pub async fn sqlite_pool() -> DatabaseConnection {
    let pool = Database::connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    Migrator::up(&pool, None).await.expect("run migrations");
    pool
}

/// 用户种子, 默认取值, 测试按需覆写字段后自行 insert
pub fn user_fixture(id: i64) -> users::ActiveModel {
    users::ActiveModel {
        id: Set(id),
        phone: Set(format!("+9112345678{id:02}")),
        username: Set(format!("user{id}")),
        email: Set(None),
        referral_code: Set(None),
        referrer_id: Set(None),
        available_tickets: Set(0),
        total_tickets_earned: Set(0),
        has_won: Set(false),
        is_blocked: Set(false),
        is_admin: Set(false),
        created_at: Set(None),
        updated_at: Set(None),
    }
}

/// 未投入的奖券种子
pub fn ticket_fixture(user_id: i64, source: TicketSource) -> tickets::ActiveModel {
    tickets::ActiveModel {
        user_id: Set(user_id),
        source: Set(source),
        is_used: Set(false),
        draw_id: Set(None),
        confirmation_code: Set(generate_confirmation_code()),
        ..Default::default()
    }
}

/// 开奖轮次种子, offset_hours 相对当前时刻
pub fn draw_fixture(status: DrawStatus, offset_hours: i64) -> draws::ActiveModel {
    draws::ActiveModel {
        draw_date: Set(Utc::now() + Duration::hours(offset_hours)),
        status: Set(status),
        prize_paise: Set(50_000),
        total_tickets: Set(0),
        winner_id: Set(None),
        ..Default::default()
    }
}
