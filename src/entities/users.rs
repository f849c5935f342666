use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 用户表实体
/// 说明:
/// - available_tickets: 尚未投入任何一期的可用奖券数 (tickets 表的缓存)
/// - total_tickets_earned: 累计获得的奖券数, 除全量重置外单调不减
/// - 不变式: available_tickets <= total_tickets_earned
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub phone: String,
    pub username: String,
    pub email: Option<String>,
    pub referral_code: Option<String>,
    pub referrer_id: Option<i64>,
    pub available_tickets: i64,
    pub total_tickets_earned: i64,
    pub has_won: bool,
    pub is_blocked: bool,
    pub is_admin: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
