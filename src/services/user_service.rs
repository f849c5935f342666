use crate::entities::{ticket_entity as tickets, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::{
    PaginatedResponse, PaginationParams, TicketListQuery, TicketResponse, UserTicketSummary,
};
use crate::services::SettingsService;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// 用户账本只读面 + 拉黑管理
#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
    settings: SettingsService,
}

impl UserService {
    pub fn new(pool: DatabaseConnection, settings: SettingsService) -> Self {
        Self { pool, settings }
    }

    pub async fn find_user(&self, user_id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }

    /// 调用者的奖券账户概览
    pub async fn get_ticket_summary(&self, user_id: i64) -> AppResult<UserTicketSummary> {
        let user = self.find_user(user_id).await?;
        Ok(user.into())
    }

    /// 管理端权限检查
    pub async fn require_admin(&self, user_id: i64) -> AppResult<users::Model> {
        let user = self.find_user(user_id).await?;
        if !user.is_admin {
            return Err(AppError::PermissionDenied);
        }
        Ok(user)
    }

    /// 奖券列表 (分页, 倒序)
    pub async fn list_tickets(
        &self,
        user_id: i64,
        query: &TicketListQuery,
    ) -> AppResult<PaginatedResponse<TicketResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let offset = params.get_offset();
        let limit = params.get_limit();

        let base_query = tickets::Entity::find().filter(tickets::Column::UserId.eq(user_id));
        let total = base_query.clone().count(&self.pool).await? as i64;

        let items = base_query
            .order_by(tickets::Column::Id, Order::Desc)
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

    /// 拉黑/解禁 (管理动作, 记审计)
    pub async fn set_blocked(
        &self,
        user_id: i64,
        blocked: bool,
        actor: &str,
        reason: Option<&str>,
    ) -> AppResult<UserTicketSummary> {
        // 目标必须存在
        self.find_user(user_id).await?;

        users::Entity::update_many()
            .col_expr(users::Column::IsBlocked, Expr::value(blocked))
            .col_expr(users::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.pool)
            .await?;

        let action = if blocked { "block_user" } else { "unblock_user" };
        if let Err(e) = self
            .settings
            .record_audit(actor, action, Some(&format!("user:{user_id}")), reason)
            .await
        {
            log::error!("Failed to record {action} audit: {e}");
        }

        let updated = self.find_user(user_id).await?;
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::audit_log_entity as audit_logs;
    use crate::test_support::{sqlite_pool, user_fixture};
    use sea_orm::{ActiveModelTrait, Set};

    fn service(pool: DatabaseConnection) -> UserService {
        UserService::new(pool.clone(), SettingsService::new(pool))
    }

    #[tokio::test]
    async fn test_require_admin_rejects_regular_user() {
        let pool = sqlite_pool().await;
        user_fixture(1).insert(&pool).await.unwrap();

        let err = service(pool).require_admin(1).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_require_admin_accepts_admin() {
        let pool = sqlite_pool().await;
        let mut admin = user_fixture(1);
        admin.is_admin = Set(true);
        admin.insert(&pool).await.unwrap();

        let admin = service(pool).require_admin(1).await.unwrap();
        assert!(admin.is_admin);
    }

    /// 拉黑落库并写审计, 解禁同理
    #[tokio::test]
    async fn test_set_blocked_persists_and_audits() {
        let pool = sqlite_pool().await;
        user_fixture(2).insert(&pool).await.unwrap();
        let svc = service(pool.clone());

        let summary = svc
            .set_blocked(2, true, "admin:1", Some("abuse"))
            .await
            .unwrap();
        assert!(summary.is_blocked);
        let row = users::Entity::find_by_id(2).one(&pool).await.unwrap().unwrap();
        assert!(row.is_blocked);

        let audit = audit_logs::Entity::find()
            .filter(audit_logs::Column::Action.eq("block_user"))
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(audit.actor, "admin:1");
        assert_eq!(audit.target.as_deref(), Some("user:2"));

        let summary = svc.set_blocked(2, false, "admin:1", None).await.unwrap();
        assert!(!summary.is_blocked);
    }
}
