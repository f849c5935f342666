use crate::entities::{
    TicketSource, ticket_entity as tickets, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::services::SettingsService;
use crate::utils::generate_confirmation_code;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};

/// 发券引擎。
/// 资格规则按来源枚举分派; 幂等标记、奖券行与计数器增量
/// 在同一事务内落库, 并发重复事件只有一次能发出奖券。
#[derive(Clone)]
pub struct TicketService {
    pool: DatabaseConnection,
    settings: SettingsService,
}

impl TicketService {
    pub fn new(pool: DatabaseConnection, settings: SettingsService) -> Self {
        Self { pool, settings }
    }

    /// 发放一张奖券。
    ///
    /// - external_key: Survey = 外部交易号, Referral = 被推荐人ID,
    ///   Social 不需要
    /// - 幂等: 同一幂等键重复调用返回 AlreadyAwarded, 不产生第二张券
    /// - 是否立即投入当前期由调用方决定, 本方法不做猜测
    pub async fn issue_ticket(
        &self,
        user_id: i64,
        source: TicketSource,
        external_key: Option<&str>,
        actor: &str,
    ) -> AppResult<tickets::Model> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        if user.is_blocked {
            return Err(AppError::AuthError(format!(
                "User {user_id} is blocked from ticket operations"
            )));
        }

        if source.requires_external_key() && external_key.is_none() {
            return Err(AppError::ValidationError(format!(
                "Source {source} requires an external reference"
            )));
        }

        let idem_key = source
            .idempotency_key(user_id, external_key)
            .ok_or_else(|| {
                AppError::ValidationError(format!("Cannot build idempotency key for {source}"))
            })?;

        let txn = self.pool.begin().await?;

        // 幂等标记: 唯一索引上的插入就是检查本身,
        // 冲突即为重复事件, 整个事务回滚, 不会多发
        self.settings
            .insert_idempotency_marker(
                &txn,
                &idem_key,
                actor,
                "issue_ticket",
                Some(&format!("user:{user_id}")),
            )
            .await?;

        let ticket = tickets::ActiveModel {
            user_id: Set(user_id),
            source: Set(source),
            is_used: Set(false),
            draw_id: Set(None),
            confirmation_code: Set(generate_confirmation_code()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // 两个计数器用原子增量更新, 避免读改写丢失更新
        let update = users::Entity::update_many()
            .col_expr(
                users::Column::AvailableTickets,
                Expr::col(users::Column::AvailableTickets).add(1),
            )
            .col_expr(
                users::Column::TotalTicketsEarned,
                Expr::col(users::Column::TotalTicketsEarned).add(1),
            )
            .filter(users::Column::Id.eq(user_id))
            .exec(&txn)
            .await?;

        if update.rows_affected != 1 {
            // 用户行消失 (并发删除), 放弃整个事务
            return Err(AppError::InternalError(format!(
                "User {user_id} disappeared during ticket issuance"
            )));
        }

        txn.commit().await?;

        log::info!(
            "Issued {source} ticket {} (code {}) to user {user_id}",
            ticket.id,
            ticket.confirmation_code
        );

        // 推荐链: 被推荐人拿到第一张问卷券时给推荐人记一张推荐券。
        // 独立的发券调用, 自带幂等键; 失败只记日志, 不影响本次发放。
        if source == TicketSource::Survey {
            if let Err(e) = self.credit_referrer_if_first_survey(&user).await {
                log::error!(
                    "Failed to credit referrer for user {user_id}: {e}"
                );
            }
        }

        Ok(ticket)
    }

    /// 被推荐人的第一张问卷券触发推荐奖励。
    /// 幂等键为 (推荐人, 被推荐人) 对, 天然防重复。
    async fn credit_referrer_if_first_survey(&self, referred: &users::Model) -> AppResult<()> {
        let Some(referrer_id) = referred.referrer_id else {
            return Ok(());
        };

        let survey_tickets = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(referred.id))
            .filter(tickets::Column::Source.eq(TicketSource::Survey))
            .count(&self.pool)
            .await?;

        // 只在第一张问卷券之后发 (重复回调由推荐幂等键兜底)
        if survey_tickets != 1 {
            return Ok(());
        }

        let referred_key = referred.id.to_string();
        // issue_ticket 与本方法互相调用, 异步递归需要装箱
        let issue = Box::pin(self.issue_ticket(
            referrer_id,
            TicketSource::Referral,
            Some(&referred_key),
            "system:referral",
        ));
        match issue.await {
            Ok(ticket) => {
                log::info!(
                    "Credited referral ticket {} to referrer {referrer_id} for referred user {}",
                    ticket.id,
                    referred.id
                );
                Ok(())
            }
            // 已发过 (重复回调) 不算错误
            Err(AppError::AlreadyAwarded(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sqlite_pool, user_fixture};

    fn service(pool: DatabaseConnection) -> TicketService {
        TicketService::new(pool.clone(), SettingsService::new(pool))
    }

    /// 被拉黑用户在任何账本写入之前就被拒绝
    #[tokio::test]
    async fn test_blocked_user_cannot_receive_tickets() {
        let pool = sqlite_pool().await;
        let mut blocked = user_fixture(5);
        blocked.is_blocked = Set(true);
        blocked.insert(&pool).await.unwrap();

        let err = service(pool.clone())
            .issue_ticket(5, TicketSource::Social, None, "user:5")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));

        let count = tickets::Entity::find().count(&pool).await.unwrap();
        assert_eq!(count, 0);
    }

    /// 问卷券缺少外部交易号直接校验失败
    #[tokio::test]
    async fn test_survey_ticket_requires_tx_id() {
        let pool = sqlite_pool().await;
        user_fixture(5).insert(&pool).await.unwrap();

        let err = service(pool)
            .issue_ticket(5, TicketSource::Survey, None, "survey:callback")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let pool = sqlite_pool().await;

        let err = service(pool)
            .issue_ticket(404, TicketSource::Social, None, "user:404")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    /// 发放成功后两个计数器同步加一, 奖券落库为未投入状态
    #[tokio::test]
    async fn test_issue_ticket_increments_counters() {
        let pool = sqlite_pool().await;
        user_fixture(5).insert(&pool).await.unwrap();

        let ticket = service(pool.clone())
            .issue_ticket(5, TicketSource::Social, None, "user:5")
            .await
            .unwrap();
        assert_eq!(ticket.user_id, 5);
        assert!(!ticket.is_used);
        assert_eq!(ticket.draw_id, None);

        let user = users::Entity::find_by_id(5).one(&pool).await.unwrap().unwrap();
        assert_eq!(user.available_tickets, 1);
        assert_eq!(user.total_tickets_earned, 1);
    }

    /// 关注奖励一生一次: 重复领取报 AlreadyAwarded 且账本不变
    #[tokio::test]
    async fn test_duplicate_social_claim_awards_exactly_one_ticket() {
        let pool = sqlite_pool().await;
        user_fixture(5).insert(&pool).await.unwrap();
        let svc = service(pool.clone());

        svc.issue_ticket(5, TicketSource::Social, None, "user:5")
            .await
            .unwrap();
        let err = svc
            .issue_ticket(5, TicketSource::Social, None, "user:5")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyAwarded(_)));

        let count = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(5))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        let user = users::Entity::find_by_id(5).one(&pool).await.unwrap().unwrap();
        assert_eq!(user.available_tickets, 1);
        assert_eq!(user.total_tickets_earned, 1);
    }

    /// 同一问卷交易号重复回调只发一张券
    #[tokio::test]
    async fn test_duplicate_survey_tx_awards_exactly_one_ticket() {
        let pool = sqlite_pool().await;
        user_fixture(5).insert(&pool).await.unwrap();
        let svc = service(pool.clone());

        svc.issue_ticket(5, TicketSource::Survey, Some("tx-77"), "survey:callback")
            .await
            .unwrap();
        let err = svc
            .issue_ticket(5, TicketSource::Survey, Some("tx-77"), "survey:callback")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyAwarded(_)));

        let count = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(5))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        // 不同交易号照常发第二张
        svc.issue_ticket(5, TicketSource::Survey, Some("tx-78"), "survey:callback")
            .await
            .unwrap();
        let user = users::Entity::find_by_id(5).one(&pool).await.unwrap().unwrap();
        assert_eq!(user.total_tickets_earned, 2);
    }

    /// 被推荐人的第一张问卷券给推荐人记一张推荐券, 只记一次
    #[tokio::test]
    async fn test_first_survey_ticket_credits_referrer_once() {
        let pool = sqlite_pool().await;
        user_fixture(1).insert(&pool).await.unwrap();
        let mut referred = user_fixture(2);
        referred.referrer_id = Set(Some(1));
        referred.insert(&pool).await.unwrap();
        let svc = service(pool.clone());

        svc.issue_ticket(2, TicketSource::Survey, Some("tx-a"), "survey:callback")
            .await
            .unwrap();

        let referral = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(1))
            .all(&pool)
            .await
            .unwrap();
        assert_eq!(referral.len(), 1);
        assert_eq!(referral[0].source, TicketSource::Referral);
        let referrer = users::Entity::find_by_id(1).one(&pool).await.unwrap().unwrap();
        assert_eq!(referrer.available_tickets, 1);

        // 第二张问卷券不再触发推荐奖励
        svc.issue_ticket(2, TicketSource::Survey, Some("tx-b"), "survey:callback")
            .await
            .unwrap();
        let count = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(1))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
