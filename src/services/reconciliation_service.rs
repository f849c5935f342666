use crate::entities::{
    draw_entity as draws, participation_entity as participations, ticket_entity as tickets,
    user_entity as users,
};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};
use serde::Serialize;
use utoipa::ToSchema;

/// 单用户对账结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserReconcileReport {
    pub user_id: i64,
    pub fixed: bool,
    pub before_available: i64,
    pub before_total: i64,
    pub after_available: i64,
    pub after_total: i64,
}

/// 批量对账汇总
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchReconcileReport {
    pub checked: u64,
    pub fixed: u64,
    /// 仅包含被修正的用户
    pub reports: Vec<UserReconcileReport>,
}

/// 某期对账结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DrawReconcileReport {
    pub draw_id: i64,
    pub participations_fixed: u64,
    pub total_before: i64,
    pub total_after: i64,
    pub fixed: bool,
}

/// 对账任务: 以 tickets 表为事实来源重算缓存计数。
/// 任何时刻、任意次数运行都安全, 除修正漂移外没有其它副作用。
#[derive(Clone)]
pub struct ReconciliationService {
    pool: DatabaseConnection,
}

impl ReconciliationService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 重算单个用户的两项计数:
    /// available = is_used=false 的奖券行数, total = 全部奖券行数
    pub async fn reconcile_user(&self, user_id: i64) -> AppResult<UserReconcileReport> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        let actual_available = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .filter(tickets::Column::IsUsed.eq(false))
            .count(&self.pool)
            .await? as i64;

        let actual_total = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .count(&self.pool)
            .await? as i64;

        let fixed =
            user.available_tickets != actual_available || user.total_tickets_earned != actual_total;

        if fixed {
            log::warn!(
                "Counter drift for user {user_id}: available {} -> {actual_available}, total {} -> {actual_total}",
                user.available_tickets,
                user.total_tickets_earned
            );
            users::Entity::update_many()
                .col_expr(
                    users::Column::AvailableTickets,
                    Expr::value(actual_available),
                )
                .col_expr(users::Column::TotalTicketsEarned, Expr::value(actual_total))
                .col_expr(users::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                .filter(users::Column::Id.eq(user_id))
                .exec(&self.pool)
                .await?;
        }

        Ok(UserReconcileReport {
            user_id,
            fixed,
            before_available: user.available_tickets,
            before_total: user.total_tickets_earned,
            after_available: actual_available,
            after_total: actual_total,
        })
    }

    /// 全体用户对账 (分批翻页, 防止一次载入全表)
    pub async fn reconcile_all_users(&self) -> AppResult<BatchReconcileReport> {
        let mut checked = 0u64;
        let mut fixed = 0u64;
        let mut reports = Vec::new();

        let mut pages = users::Entity::find().paginate(&self.pool, 200);
        while let Some(batch) = pages.fetch_and_next().await? {
            for user in batch {
                let report = self.reconcile_user(user.id).await?;
                checked += 1;
                if report.fixed {
                    fixed += 1;
                    reports.push(report);
                }
            }
        }

        log::info!("User reconciliation finished: {checked} checked, {fixed} fixed");
        Ok(BatchReconcileReport {
            checked,
            fixed,
            reports,
        })
    }

    /// 某期对账:
    /// 每条参与记录的 tickets_used 对齐实际奖券行数,
    /// 期的 total_tickets 对齐参与记录之和。
    pub async fn reconcile_draw(&self, draw_id: i64) -> AppResult<DrawReconcileReport> {
        let draw = draws::Entity::find_by_id(draw_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Draw {draw_id} not found")))?;

        let participation_rows = participations::Entity::find()
            .filter(participations::Column::DrawId.eq(draw_id))
            .all(&self.pool)
            .await?;

        let mut participations_fixed = 0u64;
        let mut actual_sum = 0i64;

        for p in &participation_rows {
            let actual = tickets::Entity::find()
                .filter(tickets::Column::UserId.eq(p.user_id))
                .filter(tickets::Column::DrawId.eq(draw_id))
                .filter(tickets::Column::IsUsed.eq(true))
                .count(&self.pool)
                .await? as i64;

            actual_sum += actual;

            if p.tickets_used != actual {
                log::warn!(
                    "Participation drift for user {} draw {draw_id}: {} -> {actual}",
                    p.user_id,
                    p.tickets_used
                );
                participations::Entity::update_many()
                    .col_expr(participations::Column::TicketsUsed, Expr::value(actual))
                    .col_expr(
                        participations::Column::UpdatedAt,
                        Expr::value(Some(Utc::now())),
                    )
                    .filter(participations::Column::Id.eq(p.id))
                    .exec(&self.pool)
                    .await?;
                participations_fixed += 1;
            }
        }

        let total_fixed = draw.total_tickets != actual_sum;
        if total_fixed {
            log::warn!(
                "Draw {draw_id} total drift: {} -> {actual_sum}",
                draw.total_tickets
            );
            draws::Entity::update_many()
                .col_expr(draws::Column::TotalTickets, Expr::value(actual_sum))
                .col_expr(draws::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                .filter(draws::Column::Id.eq(draw_id))
                .exec(&self.pool)
                .await?;
        }

        Ok(DrawReconcileReport {
            draw_id,
            participations_fixed,
            total_before: draw.total_tickets,
            total_after: actual_sum,
            fixed: participations_fixed > 0 || total_fixed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DrawStatus, TicketSource};
    use crate::test_support::{draw_fixture, sqlite_pool, ticket_fixture, user_fixture};
    use sea_orm::{ActiveModelTrait, Set};

    /// 用户 + 指定张数的未投入/已消耗奖券行, 缓存计数另行指定
    async fn seed_user(
        pool: &sea_orm::DatabaseConnection,
        id: i64,
        unused: i64,
        used: i64,
        cached_available: i64,
        cached_total: i64,
    ) {
        let mut u = user_fixture(id);
        u.available_tickets = Set(cached_available);
        u.total_tickets_earned = Set(cached_total);
        u.insert(pool).await.unwrap();
        for _ in 0..unused {
            ticket_fixture(id, TicketSource::Survey).insert(pool).await.unwrap();
        }
        for _ in 0..used {
            let mut t = ticket_fixture(id, TicketSource::Survey);
            t.is_used = Set(true);
            t.insert(pool).await.unwrap();
        }
    }

    /// 计数无漂移时对账不做写入
    #[tokio::test]
    async fn test_reconcile_user_without_drift_is_noop() {
        let pool = sqlite_pool().await;
        seed_user(&pool, 9, 2, 3, 2, 5).await;

        let report = ReconciliationService::new(pool)
            .reconcile_user(9)
            .await
            .unwrap();
        assert!(!report.fixed);
        assert_eq!(report.before_available, 2);
        assert_eq!(report.after_available, 2);
        assert_eq!(report.after_total, 5);
    }

    /// 注入的计数漂移被重算修复, 重跑一次变为无操作
    #[tokio::test]
    async fn test_reconcile_user_heals_injected_drift() {
        let pool = sqlite_pool().await;
        // 实际 2 张未投入 + 1 张已消耗, 缓存计数被人为破坏
        seed_user(&pool, 9, 2, 1, 7, 1).await;
        let svc = ReconciliationService::new(pool.clone());

        let report = svc.reconcile_user(9).await.unwrap();
        assert!(report.fixed);
        assert_eq!(report.before_available, 7);
        assert_eq!(report.after_available, 2);
        assert_eq!(report.before_total, 1);
        assert_eq!(report.after_total, 3);

        let row = users::Entity::find_by_id(9).one(&pool).await.unwrap().unwrap();
        assert_eq!(row.available_tickets, 2);
        assert_eq!(row.total_tickets_earned, 3);

        // 幂等: 修复后的再次对账是无操作
        assert!(!svc.reconcile_user(9).await.unwrap().fixed);
    }

    /// 批量对账只报告被修正的用户
    #[tokio::test]
    async fn test_reconcile_all_users_reports_only_fixed() {
        let pool = sqlite_pool().await;
        seed_user(&pool, 1, 1, 0, 1, 1).await;
        seed_user(&pool, 2, 1, 0, 5, 5).await;

        let report = ReconciliationService::new(pool)
            .reconcile_all_users()
            .await
            .unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.fixed, 1);
        assert_eq!(report.reports.len(), 1);
        assert_eq!(report.reports[0].user_id, 2);
    }

    /// 参与记录与期总数的漂移按奖券行重算
    #[tokio::test]
    async fn test_reconcile_draw_realigns_totals() {
        let pool = sqlite_pool().await;
        seed_user(&pool, 9, 0, 0, 0, 2).await;
        let draw = draw_fixture(DrawStatus::Pending, 2).insert(&pool).await.unwrap();
        // 实际投入 2 张
        for _ in 0..2 {
            let mut t = ticket_fixture(9, TicketSource::Survey);
            t.is_used = Set(true);
            t.draw_id = Set(Some(draw.id));
            t.insert(&pool).await.unwrap();
        }
        // 参与记录与期总数都带漂移
        participations::ActiveModel {
            user_id: Set(9),
            draw_id: Set(draw.id),
            tickets_used: Set(5),
            is_winner: Set(false),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();

        let report = ReconciliationService::new(pool.clone())
            .reconcile_draw(draw.id)
            .await
            .unwrap();
        assert!(report.fixed);
        assert_eq!(report.participations_fixed, 1);
        assert_eq!(report.total_before, 0);
        assert_eq!(report.total_after, 2);

        let draw_row = draws::Entity::find_by_id(draw.id).one(&pool).await.unwrap().unwrap();
        assert_eq!(draw_row.total_tickets, 2);
    }

    #[tokio::test]
    async fn test_reconcile_unknown_user_not_found() {
        let pool = sqlite_pool().await;

        let err = ReconciliationService::new(pool)
            .reconcile_user(404)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
