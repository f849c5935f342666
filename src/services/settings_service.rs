use crate::entities::{audit_log_entity as audit_logs, setting_entity as settings};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryOrder, QuerySelect, Set, SqlErr,
};

/// 奖金配置键 (settings 表)
pub const KEY_PRIZE_PAISE: &str = "prize_paise";

/// 配置与审计服务。
/// settings 是有界的配置键值表; audit_logs 是追加式审计/幂等标记表,
/// 两者职责分离, 幂等检查依赖 idempotency_key 的唯一索引。
#[derive(Clone)]
pub struct SettingsService {
    pool: DatabaseConnection,
}

impl SettingsService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let row = settings::Entity::find_by_id(key.to_string())
            .one(&self.pool)
            .await?;
        Ok(row.map(|m| m.value))
    }

    pub async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        match settings::Entity::find_by_id(key.to_string())
            .one(&self.pool)
            .await?
        {
            Some(existing) => {
                let mut am = existing.into_active_model();
                am.value = Set(value.to_string());
                am.updated_at = Set(Some(Utc::now()));
                am.update(&self.pool).await?;
            }
            None => {
                settings::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    updated_at: Set(Some(Utc::now())),
                }
                .insert(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// 读取当前奖金 (paise)。未配置时返回给定默认值。
    pub async fn get_prize_paise(&self, default: i64) -> AppResult<i64> {
        let value = self.get(KEY_PRIZE_PAISE).await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(default))
    }

    pub async fn set_prize_paise(&self, prize_paise: i64) -> AppResult<()> {
        if prize_paise <= 0 {
            return Err(AppError::ValidationError(
                "Prize amount must be positive".to_string(),
            ));
        }
        self.set(KEY_PRIZE_PAISE, &prize_paise.to_string()).await
    }

    /// 写一条审计记录 (管理操作必须调用)
    pub async fn record_audit(
        &self,
        actor: &str,
        action: &str,
        target: Option<&str>,
        detail: Option<&str>,
    ) -> AppResult<()> {
        audit_logs::ActiveModel {
            actor: Set(actor.to_string()),
            action: Set(action.to_string()),
            target: Set(target.map(|t| t.to_string())),
            detail: Set(detail.map(|d| d.to_string())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;
        Ok(())
    }

    /// 在给定连接 (通常是发券事务) 内插入幂等标记。
    /// idempotency_key 唯一冲突说明同一外部事件已处理过,
    /// 映射为 AlreadyAwarded 交由上层处理。
    pub async fn insert_idempotency_marker<C: ConnectionTrait>(
        &self,
        conn: &C,
        key: &str,
        actor: &str,
        action: &str,
        target: Option<&str>,
    ) -> AppResult<()> {
        let result = audit_logs::ActiveModel {
            idempotency_key: Set(Some(key.to_string())),
            actor: Set(actor.to_string()),
            action: Set(action.to_string()),
            target: Set(target.map(|t| t.to_string())),
            ..Default::default()
        }
        .insert(conn)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Err(AppError::AlreadyAwarded(format!(
                        "Idempotency key already recorded: {key}"
                    )))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// 最近的审计记录 (管理端排障用)
    pub async fn recent_audit_logs(&self, limit: u64) -> AppResult<Vec<audit_logs::Model>> {
        let rows = audit_logs::Entity::find()
            .order_by_desc(audit_logs::Column::Id)
            .limit(limit)
            .all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sqlite_pool;

    #[tokio::test]
    async fn test_prize_defaults_then_updates() {
        let pool = sqlite_pool().await;
        let svc = SettingsService::new(pool);

        assert_eq!(svc.get_prize_paise(50_000).await.unwrap(), 50_000);
        svc.set_prize_paise(75_000).await.unwrap();
        assert_eq!(svc.get_prize_paise(50_000).await.unwrap(), 75_000);

        let err = svc.set_prize_paise(0).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    /// 同一幂等键的第二次插入撞唯一索引, 映射为 AlreadyAwarded
    #[tokio::test]
    async fn test_idempotency_marker_rejects_duplicate_key() {
        let pool = sqlite_pool().await;
        let svc = SettingsService::new(pool.clone());

        svc.insert_idempotency_marker(&pool, "survey_tx_1", "survey:callback", "issue_ticket", None)
            .await
            .unwrap();
        let err = svc
            .insert_idempotency_marker(&pool, "survey_tx_1", "survey:callback", "issue_ticket", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyAwarded(_)));
    }
}
