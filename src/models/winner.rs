use crate::entities::winner_entity as winners;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WinnerResponse {
    pub id: i64,
    pub user_id: i64,
    pub draw_id: i64,
    pub ticket_count: i64,
    pub prize_paise: i64,
    pub claimed: bool,
    pub coupon_code: Option<String>,
    pub draw_date: DateTime<Utc>,
}

impl From<winners::Model> for WinnerResponse {
    fn from(m: winners::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            draw_id: m.draw_id,
            ticket_count: m.ticket_count,
            prize_paise: m.prize_paise,
            claimed: m.claimed,
            coupon_code: m.coupon_code,
            draw_date: m.draw_date,
        }
    }
}
