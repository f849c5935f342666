use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 奖券来源 (封闭枚举, 每个变体有各自的资格规则)
/// - Survey: 按外部问卷交易号发放, 同一交易号只发一次
/// - Social: 每个用户一生只发一次
/// - Referral: 按 (推荐人, 被推荐人) 对发放, 同一对只发一次
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum TicketSource {
    #[sea_orm(string_value = "survey")]
    Survey,
    #[sea_orm(string_value = "social")]
    Social,
    #[sea_orm(string_value = "referral")]
    Referral,
}

impl TicketSource {
    /// 计算该来源对应的幂等键。
    /// Survey 必须带外部交易号, Referral 必须带被推荐人ID,
    /// Social 只看用户本身。
    pub fn idempotency_key(&self, user_id: i64, external_key: Option<&str>) -> Option<String> {
        match self {
            TicketSource::Survey => external_key.map(|tx| format!("survey_tx_{tx}")),
            TicketSource::Social => Some(format!("social_follow_{user_id}")),
            TicketSource::Referral => {
                external_key.map(|referred| format!("referral_{user_id}_{referred}"))
            }
        }
    }

    /// 该来源是否必须携带外部引用 (交易号 / 被推荐人)
    pub fn requires_external_key(&self) -> bool {
        !matches!(self, TicketSource::Social)
    }
}

impl std::fmt::Display for TicketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketSource::Survey => write!(f, "survey"),
            TicketSource::Social => write!(f, "social"),
            TicketSource::Referral => write!(f, "referral"),
        }
    }
}

/// 奖券表实体, 账本的事实来源。
/// 生命周期:
/// - 发放: is_used=false, draw_id=NULL
/// - 投入某期: is_used=true, draw_id=<期号>
/// - 开奖重置: is_used=true, draw_id=NULL (永久消耗, 与期脱钩)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub source: TicketSource,
    pub is_used: bool,
    pub draw_id: Option<i64>,
    pub confirmation_code: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_key_requires_tx_id() {
        assert_eq!(
            TicketSource::Survey.idempotency_key(7, Some("tx1")),
            Some("survey_tx_tx1".to_string())
        );
        // 缺少交易号时无法构造幂等键
        assert_eq!(TicketSource::Survey.idempotency_key(7, None), None);
    }

    #[test]
    fn test_social_key_is_per_user() {
        assert_eq!(
            TicketSource::Social.idempotency_key(42, None),
            Some("social_follow_42".to_string())
        );
        // 外部引用被忽略
        assert_eq!(
            TicketSource::Social.idempotency_key(42, Some("x")),
            Some("social_follow_42".to_string())
        );
    }

    #[test]
    fn test_referral_key_is_per_pair() {
        assert_eq!(
            TicketSource::Referral.idempotency_key(1, Some("2")),
            Some("referral_1_2".to_string())
        );
        assert_ne!(
            TicketSource::Referral.idempotency_key(1, Some("2")),
            TicketSource::Referral.idempotency_key(1, Some("3"))
        );
    }

    #[test]
    fn test_requires_external_key() {
        assert!(TicketSource::Survey.requires_external_key());
        assert!(TicketSource::Referral.requires_external_key());
        assert!(!TicketSource::Social.requires_external_key());
    }
}
