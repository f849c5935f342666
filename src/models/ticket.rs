use crate::entities::{TicketSource, ticket_entity as tickets};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketResponse {
    pub id: i64,
    pub source: TicketSource,
    pub is_used: bool,
    pub draw_id: Option<i64>,
    pub confirmation_code: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<tickets::Model> for TicketResponse {
    fn from(m: tickets::Model) -> Self {
        Self {
            id: m.id,
            source: m.source,
            is_used: m.is_used,
            draw_id: m.draw_id,
            confirmation_code: m.confirmation_code,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TicketListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// 投入奖券的结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApplyTicketsResponse {
    pub draw_id: i64,
    pub applied: i64,
    pub remaining_available: i64,
}

/// 发券结果 (领取社交关注奖励等路径返回)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IssueTicketResponse {
    pub ticket: TicketResponse,
    pub available_tickets: i64,
    pub total_tickets_earned: i64,
}
