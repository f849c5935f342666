use crate::entities::user_entity as users;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// 用户的奖券账户视图 (只读面)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserTicketSummary {
    pub user_id: i64,
    pub username: String,
    pub available_tickets: i64,
    pub total_tickets_earned: i64,
    pub has_won: bool,
    pub is_blocked: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for UserTicketSummary {
    fn from(m: users::Model) -> Self {
        Self {
            user_id: m.id,
            username: m.username,
            available_tickets: m.available_tickets,
            total_tickets_earned: m.total_tickets_earned,
            has_won: m.has_won,
            is_blocked: m.is_blocked,
            created_at: m.created_at,
        }
    }
}
