use crate::entities::{
    DrawStatus, draw_entity as draws, participation_entity as participations,
    ticket_entity as tickets, user_entity as users,
};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};

/// 投入引擎: 把用户未投入的奖券移入指定期。
/// 三部写 (奖券行 / 参与记录 / 期总数) 必须在同一事务内完成,
/// 部分落库会直接打破核心一致性不变式。
#[derive(Clone)]
pub struct ParticipationService {
    pool: DatabaseConnection,
}

impl ParticipationService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 把用户可用奖券投入指定期。
    ///
    /// - exact=None: 投入全部可用奖券; 没有可投的返回 Ok(0), 不算错误
    /// - exact=Some(n): 精确投入 n 张, 不足时返回 InsufficientTickets
    /// - 期已开奖或时间已过: DrawClosed, 零写入
    ///
    /// 状态检查与写入在同一事务内, 开奖与投入的竞争由此收敛。
    pub async fn apply_available_tickets(
        &self,
        user_id: i64,
        draw_id: i64,
        exact: Option<i64>,
    ) -> AppResult<i64> {
        if let Some(n) = exact
            && n <= 0
        {
            return Err(AppError::ValidationError(
                "Exact ticket count must be positive".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;

        let draw = draws::Entity::find_by_id(draw_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Draw {draw_id} not found")))?;

        if !draw.is_open(Utc::now()) {
            return Err(AppError::DrawClosed(format!(
                "Draw {draw_id} is not accepting tickets"
            )));
        }

        let user = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        if user.is_blocked {
            return Err(AppError::AuthError(format!(
                "User {user_id} is blocked from ticket operations"
            )));
        }

        // 未投入的奖券行才是事实, 不信任缓存计数
        let mut unapplied = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .filter(tickets::Column::IsUsed.eq(false))
            .filter(tickets::Column::DrawId.is_null())
            .order_by(tickets::Column::Id, Order::Asc);
        if let Some(n) = exact {
            unapplied = unapplied.limit(n as u64);
        }
        let ticket_rows = unapplied.all(&txn).await?;

        if let Some(n) = exact
            && (ticket_rows.len() as i64) < n
        {
            return Err(AppError::InsufficientTickets {
                requested: n,
                available: ticket_rows.len() as i64,
            });
        }

        if ticket_rows.is_empty() {
            // 无可投奖券是无操作, 不是错误
            txn.commit().await?;
            return Ok(0);
        }

        let applied = ticket_rows.len() as i64;
        let ticket_ids: Vec<i64> = ticket_rows.iter().map(|t| t.id).collect();

        // (1) 奖券行: 标记已用并挂到该期
        let marked = tickets::Entity::update_many()
            .col_expr(tickets::Column::IsUsed, Expr::value(true))
            .col_expr(tickets::Column::DrawId, Expr::value(Some(draw_id)))
            .filter(tickets::Column::Id.is_in(ticket_ids))
            .filter(tickets::Column::IsUsed.eq(false))
            .exec(&txn)
            .await?;

        if marked.rows_affected != applied as u64 {
            // 并发把部分奖券抢先消耗了, 放弃整个事务重来
            return Err(AppError::InternalError(format!(
                "Concurrent ticket mutation for user {user_id}, expected {applied} rows, got {}",
                marked.rows_affected
            )));
        }

        // (2) 参与记录: 首次创建, 之后累加
        self.upsert_participation(&txn, user_id, draw_id, applied)
            .await?;

        // (3) 期总数: 原子增量, 且仅对仍待开奖的期生效
        let draw_update = draws::Entity::update_many()
            .col_expr(
                draws::Column::TotalTickets,
                Expr::col(draws::Column::TotalTickets).add(applied),
            )
            .col_expr(draws::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(draws::Column::Id.eq(draw_id))
            .filter(draws::Column::Status.eq(DrawStatus::Pending))
            .exec(&txn)
            .await?;

        if draw_update.rows_affected != 1 {
            // 事务进行中被开奖了
            return Err(AppError::DrawClosed(format!(
                "Draw {draw_id} was resolved concurrently"
            )));
        }

        // 用户可用计数同事务内原子扣减 (不触碰 total_tickets_earned)
        let user_update = users::Entity::update_many()
            .col_expr(
                users::Column::AvailableTickets,
                Expr::col(users::Column::AvailableTickets).sub(applied),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::AvailableTickets.gte(applied))
            .exec(&txn)
            .await?;

        if user_update.rows_affected != 1 {
            // 计数器已漂移 (小于实际奖券行数), 整个事务回滚,
            // 修复交给对账任务, 投入路径不自行改写计数
            log::warn!("available_tickets drift detected for user {user_id} during apply");
            return Err(AppError::InternalError(format!(
                "available_tickets drift for user {user_id}, run reconciliation"
            )));
        }

        txn.commit().await?;

        log::info!("Applied {applied} ticket(s) of user {user_id} to draw {draw_id}");
        Ok(applied)
    }

    /// 参与记录 upsert。先查后插, 插入撞唯一索引时退回累加。
    async fn upsert_participation(
        &self,
        txn: &DatabaseTransaction,
        user_id: i64,
        draw_id: i64,
        applied: i64,
    ) -> AppResult<()> {
        let existing = participations::Entity::find()
            .filter(participations::Column::UserId.eq(user_id))
            .filter(participations::Column::DrawId.eq(draw_id))
            .one(txn)
            .await?;

        if existing.is_some() {
            self.increment_participation(txn, user_id, draw_id, applied)
                .await?;
            return Ok(());
        }

        let insert = participations::ActiveModel {
            user_id: Set(user_id),
            draw_id: Set(draw_id),
            tickets_used: Set(applied),
            is_winner: Set(false),
            ..Default::default()
        }
        .insert(txn)
        .await;

        match insert {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // 并发首投, 对方已建行
                self.increment_participation(txn, user_id, draw_id, applied)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn increment_participation(
        &self,
        txn: &DatabaseTransaction,
        user_id: i64,
        draw_id: i64,
        applied: i64,
    ) -> AppResult<()> {
        let update = participations::Entity::update_many()
            .col_expr(
                participations::Column::TicketsUsed,
                Expr::col(participations::Column::TicketsUsed).add(applied),
            )
            .col_expr(
                participations::Column::UpdatedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(participations::Column::UserId.eq(user_id))
            .filter(participations::Column::DrawId.eq(draw_id))
            .exec(txn)
            .await?;

        if update.rows_affected != 1 {
            return Err(AppError::InternalError(format!(
                "Participation row for user {user_id} draw {draw_id} vanished"
            )));
        }
        Ok(())
    }

    /// 用户在某期的参与记录 (只读)
    pub async fn find_participation(
        &self,
        user_id: i64,
        draw_id: i64,
    ) -> AppResult<Option<participations::Model>> {
        let row = participations::Entity::find()
            .filter(participations::Column::UserId.eq(user_id))
            .filter(participations::Column::DrawId.eq(draw_id))
            .one(&self.pool)
            .await?;
        Ok(row)
    }
}
