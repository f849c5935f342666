use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 问卷提供方回调参数 (GET 查询串)。
/// hash = md5(user_id + secret), 校验失败不触碰账本。
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SurveyCallbackQuery {
    pub user_id: i64,
    pub tx_id: String,
    /// "1" / "success" 视为完成, 其余仅确认收到
    pub status: String,
    pub hash: String,
}

impl SurveyCallbackQuery {
    pub fn is_success(&self) -> bool {
        matches!(self.status.as_str(), "1" | "success" | "complete")
    }
}

/// 回调确认响应。对提供方永远是 200, duplicate/error 只作补充说明。
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SurveyCallbackAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SurveyCallbackAck {
    pub fn received() -> Self {
        Self {
            received: true,
            duplicate: None,
            error: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            duplicate: Some(true),
            ..Self::received()
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::received()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(status: &str) -> SurveyCallbackQuery {
        SurveyCallbackQuery {
            user_id: 1,
            tx_id: "tx1".to_string(),
            status: status.to_string(),
            hash: String::new(),
        }
    }

    #[test]
    fn test_success_statuses() {
        assert!(query("1").is_success());
        assert!(query("success").is_success());
        assert!(query("complete").is_success());
    }

    #[test]
    fn test_failure_statuses() {
        assert!(!query("0").is_success());
        assert!(!query("failed").is_success());
        assert!(!query("").is_success());
    }

    /// 普通确认不带 duplicate/error 字段
    #[test]
    fn test_plain_ack_omits_optional_fields() {
        let ack = serde_json::to_value(SurveyCallbackAck::received()).unwrap();
        assert_eq!(ack, serde_json::json!({ "received": true }));

        let dup = serde_json::to_value(SurveyCallbackAck::duplicate()).unwrap();
        assert_eq!(dup, serde_json::json!({ "received": true, "duplicate": true }));
    }
}
