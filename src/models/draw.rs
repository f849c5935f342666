use crate::entities::{DrawStatus, draw_entity as draws};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DrawResponse {
    pub id: i64,
    pub draw_date: DateTime<Utc>,
    pub status: DrawStatus,
    pub prize_paise: i64,
    pub total_tickets: i64,
    pub winner_id: Option<i64>,
}

impl From<draws::Model> for DrawResponse {
    fn from(m: draws::Model) -> Self {
        Self {
            id: m.id,
            draw_date: m.draw_date,
            status: m.status,
            prize_paise: m.prize_paise,
            total_tickets: m.total_tickets,
            winner_id: m.winner_id,
        }
    }
}

/// 当前期 + 调用者视角的参与情况
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrentDrawResponse {
    pub draw: DrawResponse,
    pub available_tickets: i64,
    pub total_tickets_earned: i64,
    pub my_tickets_in_draw: i64,
    pub has_won: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WinnerListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
