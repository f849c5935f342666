use crate::entities::{
    DrawStatus, draw_entity as draws, participation_entity as participations,
    ticket_entity as tickets, user_entity as users, winner_entity as winners,
};
use crate::error::{AppError, AppResult};
use crate::models::ResetLotteryResponse;
use crate::services::SettingsService;
use chrono::Utc;
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

/// 在未消耗的奖券里等概率抽一张, 返回其下标。
/// 对原始奖券抽签 (而非按参与记录加权), 中奖概率天然与持券数成正比。
fn pick_ticket_index<R: Rng>(rng: &mut R, ticket_count: usize) -> usize {
    rng.gen_range(0..ticket_count)
}

/// 开奖引擎: 选出中奖人并一次性落下全部收尾写入。
/// PENDING -> COMPLETED 是单向终态。
#[derive(Clone)]
pub struct ResolutionService {
    pool: DatabaseConnection,
    settings: SettingsService,
}

impl ResolutionService {
    pub fn new(pool: DatabaseConnection, settings: SettingsService) -> Self {
        Self { pool, settings }
    }

    /// 开奖。
    ///
    /// - winner_user_id=None: 自动路径, 在全部未消耗奖券
    ///   (is_used=false, 排除拉黑用户) 中等概率抽一张, 券主即中奖人
    /// - winner_user_id=Some: 管理员指定, 要求该用户在本期有参与记录
    ///
    /// 收尾写入 (中奖人奖券消耗 / 用户标记 / 期完结 / Winner 行)
    /// 全部在同一事务内, 要么全部发生要么全不发生。
    pub async fn resolve_draw(
        &self,
        draw_id: i64,
        winner_user_id: Option<i64>,
        actor: &str,
    ) -> AppResult<winners::Model> {
        let txn = self.pool.begin().await?;

        let draw = draws::Entity::find_by_id(draw_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Draw {draw_id} not found")))?;

        if draw.status != DrawStatus::Pending {
            return Err(AppError::DrawClosed(format!(
                "Draw {draw_id} is already resolved"
            )));
        }

        let (winner_id, ticket_count) = match winner_user_id {
            Some(uid) => {
                // 手动路径: 必须已有参与记录
                let participation = participations::Entity::find()
                    .filter(participations::Column::UserId.eq(uid))
                    .filter(participations::Column::DrawId.eq(draw_id))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::ValidationError(format!(
                            "User {uid} has no participation in draw {draw_id}"
                        ))
                    })?;

                // 快照 = 该用户当前仍未消耗的奖券数 + 本期投入
                let active = tickets::Entity::find()
                    .filter(tickets::Column::UserId.eq(uid))
                    .filter(tickets::Column::IsUsed.eq(false))
                    .all(&txn)
                    .await?
                    .len() as i64;
                (uid, active + participation.tickets_used)
            }
            None => self.pick_random_winner(&txn).await?,
        };

        // 中奖人的奖券 (未消耗的 + 投入本期的) 全部消耗并与期脱钩,
        // 永久花掉
        tickets::Entity::update_many()
            .col_expr(tickets::Column::IsUsed, Expr::value(true))
            .col_expr(tickets::Column::DrawId, Expr::value(Option::<i64>::None))
            .filter(tickets::Column::UserId.eq(winner_id))
            .filter(
                Condition::any()
                    .add(tickets::Column::IsUsed.eq(false))
                    .add(tickets::Column::DrawId.eq(draw_id)),
            )
            .exec(&txn)
            .await?;

        // 中奖人账户: 可用清零, 标记待领奖; 累计获得数保持不变
        users::Entity::update_many()
            .col_expr(users::Column::AvailableTickets, Expr::value(0i64))
            .col_expr(users::Column::HasWon, Expr::value(true))
            .col_expr(users::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(users::Column::Id.eq(winner_id))
            .exec(&txn)
            .await?;

        // 参与记录打上中奖标记 (自动路径中奖人可能无参与记录, 忽略行数)
        participations::Entity::update_many()
            .col_expr(participations::Column::IsWinner, Expr::value(true))
            .col_expr(
                participations::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(participations::Column::UserId.eq(winner_id))
            .filter(participations::Column::DrawId.eq(draw_id))
            .exec(&txn)
            .await?;

        // 期完结, 只允许从 PENDING 转一次
        let completed = draws::Entity::update_many()
            .col_expr(draws::Column::Status, Expr::value(DrawStatus::Completed))
            .col_expr(draws::Column::WinnerId, Expr::value(Some(winner_id)))
            .col_expr(draws::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(draws::Column::Id.eq(draw_id))
            .filter(draws::Column::Status.eq(DrawStatus::Pending))
            .exec(&txn)
            .await?;

        if completed.rows_affected != 1 {
            return Err(AppError::DrawClosed(format!(
                "Draw {draw_id} was resolved concurrently"
            )));
        }

        let winner = winners::ActiveModel {
            user_id: Set(winner_id),
            draw_id: Set(draw_id),
            ticket_count: Set(ticket_count),
            prize_paise: Set(draw.prize_paise),
            claimed: Set(false),
            coupon_code: Set(None),
            draw_date: Set(draw.draw_date),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        log::info!(
            "Draw {draw_id} resolved, winner user {winner_id} with {ticket_count} ticket(s)"
        );
        if let Err(e) = self
            .settings
            .record_audit(
                actor,
                "resolve_draw",
                Some(&format!("draw:{draw_id}")),
                Some(&format!(
                    "{{\"winner_user_id\":{winner_id},\"ticket_count\":{ticket_count}}}"
                )),
            )
            .await
        {
            log::error!("Failed to record resolve_draw audit: {e}");
        }

        Ok(winner)
    }

    /// 自动路径: 收集全部未消耗奖券 (排除拉黑用户), 等概率抽一张。
    async fn pick_random_winner(
        &self,
        txn: &sea_orm::DatabaseTransaction,
    ) -> AppResult<(i64, i64)> {
        let active_tickets = tickets::Entity::find()
            .filter(tickets::Column::IsUsed.eq(false))
            .order_by(tickets::Column::Id, Order::Asc)
            .all(txn)
            .await?;

        if active_tickets.is_empty() {
            return Err(AppError::ValidationError(
                "No active tickets to draw from".to_string(),
            ));
        }

        let blocked: Vec<i64> = users::Entity::find()
            .filter(users::Column::IsBlocked.eq(true))
            .all(txn)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        let eligible: Vec<&tickets::Model> = active_tickets
            .iter()
            .filter(|t| !blocked.contains(&t.user_id))
            .collect();

        if eligible.is_empty() {
            return Err(AppError::ValidationError(
                "No eligible tickets to draw from".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        let picked = eligible[pick_ticket_index(&mut rng, eligible.len())];
        let winner_id = picked.user_id;
        let ticket_count = eligible
            .iter()
            .filter(|t| t.user_id == winner_id)
            .count() as i64;

        Ok((winner_id, ticket_count))
    }

    /// 全系统重置 ("reset lottery" 管理动作):
    /// 所有未消耗奖券作废 (消耗+脱钩), 所有用户可用计数清零,
    /// 累计获得数不动。一个事务完成, 重置后一致性不变式立即成立。
    pub async fn reset_lottery(&self, actor: &str) -> AppResult<ResetLotteryResponse> {
        let txn = self.pool.begin().await?;

        let spent = tickets::Entity::update_many()
            .col_expr(tickets::Column::IsUsed, Expr::value(true))
            .col_expr(tickets::Column::DrawId, Expr::value(Option::<i64>::None))
            .filter(tickets::Column::IsUsed.eq(false))
            .exec(&txn)
            .await?;

        let reset = users::Entity::update_many()
            .col_expr(users::Column::AvailableTickets, Expr::value(0i64))
            .col_expr(users::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(users::Column::AvailableTickets.ne(0))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        log::info!(
            "Lottery reset by {actor}: {} ticket(s) spent, {} user(s) zeroed",
            spent.rows_affected,
            reset.rows_affected
        );
        if let Err(e) = self
            .settings
            .record_audit(
                actor,
                "reset_lottery",
                None,
                Some(&format!(
                    "{{\"tickets_spent\":{},\"users_reset\":{}}}",
                    spent.rows_affected, reset.rows_affected
                )),
            )
            .await
        {
            log::error!("Failed to record reset_lottery audit: {e}");
        }

        Ok(ResetLotteryResponse {
            users_reset: reset.rows_affected,
            tickets_spent: spent.rows_affected,
        })
    }

    /// 发放兑换码, 恰好一次。已领取的再领取报错且零写入。
    pub async fn claim_prize(
        &self,
        winner_id: i64,
        coupon_code: &str,
        actor: &str,
    ) -> AppResult<winners::Model> {
        if coupon_code.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Coupon code must not be empty".to_string(),
            ));
        }

        winners::Entity::find_by_id(winner_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winner {winner_id} not found")))?;

        // claimed=false 的条件更新就是一次性保证
        let update = winners::Entity::update_many()
            .col_expr(winners::Column::Claimed, Expr::value(true))
            .col_expr(
                winners::Column::CouponCode,
                Expr::value(Some(coupon_code.to_string())),
            )
            .col_expr(winners::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(winners::Column::Id.eq(winner_id))
            .filter(winners::Column::Claimed.eq(false))
            .exec(&self.pool)
            .await?;

        if update.rows_affected != 1 {
            return Err(AppError::ValidationError(format!(
                "Winner {winner_id} already claimed the prize"
            )));
        }

        // 中奖人完成领奖, 清除待领奖标记
        let claimed = winners::Entity::find_by_id(winner_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Winner {winner_id} not found")))?;

        users::Entity::update_many()
            .col_expr(users::Column::HasWon, Expr::value(false))
            .col_expr(users::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(users::Column::Id.eq(claimed.user_id))
            .exec(&self.pool)
            .await?;

        if let Err(e) = self
            .settings
            .record_audit(
                actor,
                "claim_prize",
                Some(&format!("winner:{winner_id}")),
                Some(&format!("{{\"coupon_code\":\"{coupon_code}\"}}")),
            )
            .await
        {
            log::error!("Failed to record claim_prize audit: {e}");
        }

        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TicketSource;
    use crate::test_support::{draw_fixture, sqlite_pool, ticket_fixture, user_fixture};
    use sea_orm::PaginatorTrait;

    /// 抽样结果永远落在候选范围内
    #[test]
    fn test_pick_ticket_index_in_bounds() {
        let mut rng = rand::thread_rng();
        for n in [1usize, 2, 7, 100] {
            for _ in 0..50 {
                assert!(pick_ticket_index(&mut rng, n) < n);
            }
        }
    }

    /// 单张候选时抽样是确定的
    #[test]
    fn test_pick_single_ticket() {
        let mut rng = rand::thread_rng();
        assert_eq!(pick_ticket_index(&mut rng, 1), 0);
    }

    fn service(pool: DatabaseConnection) -> ResolutionService {
        ResolutionService::new(pool.clone(), SettingsService::new(pool))
    }

    async fn seed_player(pool: &DatabaseConnection, id: i64, unused: i64) {
        let mut u = user_fixture(id);
        u.available_tickets = Set(unused);
        u.total_tickets_earned = Set(unused);
        u.insert(pool).await.unwrap();
        for _ in 0..unused {
            ticket_fixture(id, TicketSource::Survey).insert(pool).await.unwrap();
        }
    }

    /// 已完结的期不允许再次开奖
    #[tokio::test]
    async fn test_resolve_completed_draw_fails() {
        let pool = sqlite_pool().await;
        let draw = draw_fixture(DrawStatus::Completed, -1).insert(&pool).await.unwrap();

        let err = service(pool)
            .resolve_draw(draw.id, None, "admin:1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DrawClosed(_)));
    }

    /// 自动开奖: 唯一持券人必然中奖, 收尾写入全部落库
    #[tokio::test]
    async fn test_resolve_draw_auto_path_settles_winner() {
        let pool = sqlite_pool().await;
        seed_player(&pool, 9, 2).await;
        let draw = draw_fixture(DrawStatus::Pending, 1).insert(&pool).await.unwrap();
        let svc = service(pool.clone());

        let winner = svc.resolve_draw(draw.id, None, "admin:1").await.unwrap();
        assert_eq!(winner.user_id, 9);
        assert_eq!(winner.ticket_count, 2);
        assert_eq!(winner.prize_paise, draw.prize_paise);
        assert!(!winner.claimed);

        let draw_row = draws::Entity::find_by_id(draw.id).one(&pool).await.unwrap().unwrap();
        assert_eq!(draw_row.status, DrawStatus::Completed);
        assert_eq!(draw_row.winner_id, Some(9));

        let user = users::Entity::find_by_id(9).one(&pool).await.unwrap().unwrap();
        assert!(user.has_won);
        assert_eq!(user.available_tickets, 0);

        // 中奖人的奖券全部消耗且与期脱钩
        let unspent = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(9))
            .filter(tickets::Column::IsUsed.eq(false))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(unspent, 0);

        // 终态单向: 再开一次报 DrawClosed
        let err = svc.resolve_draw(draw.id, None, "admin:1").await.unwrap_err();
        assert!(matches!(err, AppError::DrawClosed(_)));
    }

    /// 手动指定中奖人必须有本期参与记录
    #[tokio::test]
    async fn test_resolve_manual_requires_participation() {
        let pool = sqlite_pool().await;
        seed_player(&pool, 9, 1).await;
        let draw = draw_fixture(DrawStatus::Pending, 1).insert(&pool).await.unwrap();

        let err = service(pool)
            .resolve_draw(draw.id, Some(9), "admin:1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_claim_with_empty_coupon_rejected() {
        let pool = sqlite_pool().await;
        let err = service(pool)
            .claim_prize(1, "  ", "admin:1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    /// 领奖恰好一次: 第二次领取报错且兑换码不被覆盖
    #[tokio::test]
    async fn test_claim_prize_is_one_shot() {
        let pool = sqlite_pool().await;
        seed_player(&pool, 9, 1).await;
        let draw = draw_fixture(DrawStatus::Pending, 1).insert(&pool).await.unwrap();
        let svc = service(pool.clone());
        let winner = svc.resolve_draw(draw.id, None, "admin:1").await.unwrap();

        let claimed = svc.claim_prize(winner.id, "CPN-1", "admin:1").await.unwrap();
        assert!(claimed.claimed);
        assert_eq!(claimed.coupon_code.as_deref(), Some("CPN-1"));
        // 领奖后清除待领奖标记
        let user = users::Entity::find_by_id(9).one(&pool).await.unwrap().unwrap();
        assert!(!user.has_won);

        let err = svc.claim_prize(winner.id, "CPN-2", "admin:1").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        let row = winners::Entity::find_by_id(winner.id).one(&pool).await.unwrap().unwrap();
        assert_eq!(row.coupon_code.as_deref(), Some("CPN-1"));
    }

    /// 全量重置: 未消耗奖券作废, 可用计数清零, 累计获得数不动
    #[tokio::test]
    async fn test_reset_lottery_spends_and_zeroes() {
        let pool = sqlite_pool().await;
        seed_player(&pool, 1, 2).await;
        seed_player(&pool, 2, 1).await;
        let svc = service(pool.clone());

        let result = svc.reset_lottery("admin:1").await.unwrap();
        assert_eq!(result.tickets_spent, 3);
        assert_eq!(result.users_reset, 2);

        let unspent = tickets::Entity::find()
            .filter(tickets::Column::IsUsed.eq(false))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(unspent, 0);
        let user = users::Entity::find_by_id(1).one(&pool).await.unwrap().unwrap();
        assert_eq!(user.available_tickets, 0);
        assert_eq!(user.total_tickets_earned, 2);

        // 重置后再重置是无操作
        let again = svc.reset_lottery("admin:1").await.unwrap();
        assert_eq!(again.tickets_spent, 0);
        assert_eq!(again.users_reset, 0);
    }
}
