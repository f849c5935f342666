use crate::config::LotteryConfig;
use crate::entities::{DrawStatus, draw_entity as draws, winner_entity as winners};
use crate::error::{AppError, AppResult};
use crate::models::{PaginatedResponse, PaginationParams, WinnerListQuery, WinnerResponse};
use crate::services::SettingsService;
use crate::utils::next_draw_date;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};

/// 开奖轮次调度服务。
/// 单活跃期不变式由 draw_date 唯一索引 + "最近待开奖"查询共同保证:
/// 并发创建时只有一个插入成功, 失败方重新查询即可。
#[derive(Clone)]
pub struct DrawService {
    pool: DatabaseConnection,
    settings: SettingsService,
    lottery: LotteryConfig,
}

impl DrawService {
    pub fn new(pool: DatabaseConnection, settings: SettingsService, lottery: LotteryConfig) -> Self {
        Self {
            pool,
            settings,
            lottery,
        }
    }

    /// 最近的待开奖轮次 (draw_date 在未来)。
    /// 调用方永远按"最近待开奖"取期, 不按 id 缓存。
    pub async fn find_current_draw(&self) -> AppResult<Option<draws::Model>> {
        let now = Utc::now();
        let draw = draws::Entity::find()
            .filter(draws::Column::Status.eq(DrawStatus::Pending))
            .filter(draws::Column::DrawDate.gt(now))
            .order_by(draws::Column::DrawDate, Order::Asc)
            .one(&self.pool)
            .await?;
        Ok(draw)
    }

    /// 取当前期, 不存在则创建。
    /// 奖金在创建时从配置快照, 之后不随配置变动。
    pub async fn get_or_create_current_draw(&self) -> AppResult<draws::Model> {
        if let Some(draw) = self.find_current_draw().await? {
            return Ok(draw);
        }

        let draw_date = next_draw_date(
            Utc::now(),
            self.lottery.draw_weekday,
            self.lottery.draw_hour,
            self.lottery.draw_minute,
            self.lottery.tz_offset_minutes,
        );
        let prize_paise = self
            .settings
            .get_prize_paise(self.lottery.default_prize_paise)
            .await?;

        let result = draws::ActiveModel {
            draw_date: Set(draw_date),
            status: Set(DrawStatus::Pending),
            prize_paise: Set(prize_paise),
            total_tickets: Set(0),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match result {
            Ok(draw) => {
                log::info!(
                    "Created draw {} at {} with prize {} paise",
                    draw.id,
                    draw.draw_date,
                    draw.prize_paise
                );
                Ok(draw)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // 创建竞争: 另一请求已插入同一 draw_date, 重新查询
                if let Some(draw) = self.find_current_draw().await? {
                    return Ok(draw);
                }
                // 该档期被一个提前开奖的已完结轮次占住, 顺延一周
                let following = next_draw_date(
                    draw_date,
                    self.lottery.draw_weekday,
                    self.lottery.draw_hour,
                    self.lottery.draw_minute,
                    self.lottery.tz_offset_minutes,
                );
                let draw = draws::ActiveModel {
                    draw_date: Set(following),
                    status: Set(DrawStatus::Pending),
                    prize_paise: Set(prize_paise),
                    total_tickets: Set(0),
                    ..Default::default()
                }
                .insert(&self.pool)
                .await?;
                log::info!(
                    "Slot {draw_date} already taken by a resolved draw, scheduled draw {} at {following}",
                    draw.id
                );
                Ok(draw)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_draw(&self, draw_id: i64) -> AppResult<draws::Model> {
        draws::Entity::find_by_id(draw_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Draw {draw_id} not found")))
    }

    /// 历史中奖记录 (分页, 倒序)
    pub async fn list_winners(
        &self,
        query: &WinnerListQuery,
    ) -> AppResult<PaginatedResponse<WinnerResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let offset = params.get_offset();
        let limit = params.get_limit();

        let base_query = winners::Entity::find();
        let total = base_query.clone().count(&self.pool).await? as i64;

        let items = base_query
            .order_by(winners::Column::DrawDate, Order::Desc)
            .limit(limit as u64)
            .offset(offset as u64)
            .all(&self.pool)
            .await?;

        Ok(PaginatedResponse::new(
            items.into_iter().map(Into::into).collect(),
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(20),
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draw_fixture, sqlite_pool};
    use chrono::Duration;

    fn service(pool: DatabaseConnection) -> DrawService {
        DrawService::new(
            pool.clone(),
            SettingsService::new(pool),
            LotteryConfig::default(),
        )
    }

    /// 已存在待开奖轮次时直接返回, 不创建新期
    #[tokio::test]
    async fn test_get_or_create_returns_existing_pending_draw() {
        let pool = sqlite_pool().await;
        let existing = draw_fixture(DrawStatus::Pending, 48).insert(&pool).await.unwrap();

        let draw = service(pool).get_or_create_current_draw().await.unwrap();
        assert_eq!(draw.id, existing.id);
        assert_eq!(draw.status, DrawStatus::Pending);
    }

    /// 空表时创建新期: 落在配置的开奖档期, 奖金取配置快照
    #[tokio::test]
    async fn test_get_or_create_schedules_next_slot() {
        let pool = sqlite_pool().await;
        let lottery = LotteryConfig::default();
        let svc = service(pool.clone());

        let before = Utc::now();
        let draw = svc.get_or_create_current_draw().await.unwrap();
        assert_eq!(draw.status, DrawStatus::Pending);
        assert_eq!(
            draw.draw_date,
            next_draw_date(
                before,
                lottery.draw_weekday,
                lottery.draw_hour,
                lottery.draw_minute,
                lottery.tz_offset_minutes,
            )
        );
        assert_eq!(draw.prize_paise, lottery.default_prize_paise);

        // 第二次调用取回同一期
        let again = svc.get_or_create_current_draw().await.unwrap();
        assert_eq!(again.id, draw.id);
    }

    /// 奖金从 settings 快照而非硬编码默认值
    #[tokio::test]
    async fn test_get_or_create_snapshots_configured_prize() {
        let pool = sqlite_pool().await;
        let settings = SettingsService::new(pool.clone());
        settings.set_prize_paise(75_000).await.unwrap();

        let draw = service(pool).get_or_create_current_draw().await.unwrap();
        assert_eq!(draw.prize_paise, 75_000);
    }

    /// 本周档期被提前开奖的已完结轮次占住时顺延一周
    #[tokio::test]
    async fn test_get_or_create_skips_slot_taken_by_resolved_draw() {
        let pool = sqlite_pool().await;
        let lottery = LotteryConfig::default();
        let slot = next_draw_date(
            Utc::now(),
            lottery.draw_weekday,
            lottery.draw_hour,
            lottery.draw_minute,
            lottery.tz_offset_minutes,
        );
        // 提前开奖: 档期日期仍在未来但状态已完结
        let mut occupied = draw_fixture(DrawStatus::Completed, 0);
        occupied.draw_date = Set(slot);
        occupied.winner_id = Set(Some(1));
        let occupied = occupied.insert(&pool).await.unwrap();

        let draw = service(pool).get_or_create_current_draw().await.unwrap();
        assert_ne!(draw.id, occupied.id);
        assert_eq!(draw.status, DrawStatus::Pending);
        assert_eq!(draw.draw_date, slot + Duration::days(7));
    }

    #[tokio::test]
    async fn test_find_draw_not_found() {
        let pool = sqlite_pool().await;

        let err = service(pool).find_draw(99).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
