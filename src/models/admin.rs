use crate::entities::TicketSource;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 触发开奖。winner_user_id 缺省时按票数比例随机选取。
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResolveDrawRequest {
    pub draw_id: Option<i64>,
    pub winner_user_id: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePrizeRequest {
    pub prize_paise: i64,
    pub reason: Option<String>,
}

/// 手工/测试发券
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AdminIssueTicketRequest {
    pub user_id: i64,
    pub source: TicketSource,
    pub external_key: Option<String>,
    /// 是否立即投入当前期
    #[serde(default)]
    pub apply: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClaimPrizeRequest {
    pub coupon_code: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BlockUserRequest {
    pub reason: Option<String>,
}

/// 对账请求。user_id 缺省时对全体用户和当前期执行。
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResetLotteryResponse {
    pub users_reset: u64,
    pub tickets_spent: u64,
}
