use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 开奖轮次状态, PENDING -> COMPLETED 单向终态
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum DrawStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
}

/// 开奖轮次实体
/// - prize_paise 在创建时从配置拷贝, 之后不再变动
/// - total_tickets 是各参与记录 tickets_used 之和的缓存
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "draws")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub draw_date: DateTime<Utc>,
    pub status: DrawStatus,
    pub prize_paise: i64,
    pub total_tickets: i64,
    pub winner_id: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// 是否仍可接受投入 (状态待开奖且开奖时间未过)
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status == DrawStatus::Pending && self.draw_date > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draw(status: DrawStatus, draw_date: DateTime<Utc>) -> Model {
        Model {
            id: 1,
            draw_date,
            status,
            prize_paise: 50000,
            total_tickets: 0,
            winner_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_pending_future_draw_is_open() {
        let now = Utc::now();
        assert!(draw(DrawStatus::Pending, now + Duration::hours(1)).is_open(now));
    }

    #[test]
    fn test_completed_or_past_draw_is_closed() {
        let now = Utc::now();
        assert!(!draw(DrawStatus::Completed, now + Duration::hours(1)).is_open(now));
        assert!(!draw(DrawStatus::Pending, now - Duration::minutes(1)).is_open(now));
    }
}
