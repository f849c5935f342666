//! 问卷回调签名校验。
//! 提供方约定: hash = md5(user_id + secret), 十六进制小写。

use crate::error::{AppError, AppResult};

/// 计算期望签名
pub fn survey_callback_hash(user_id: i64, secret: &str) -> String {
    format!("{:x}", md5::compute(format!("{user_id}{secret}")))
}

/// 校验回调签名 (大小写不敏感)。
/// 校验失败必须发生在任何账本读写之前。
pub fn verify_survey_callback(user_id: i64, secret: &str, provided: &str) -> AppResult<()> {
    let expected = survey_callback_hash(user_id, secret);
    if expected.eq_ignore_ascii_case(provided.trim()) {
        Ok(())
    } else {
        Err(AppError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable() {
        let h1 = survey_callback_hash(42, "topsecret");
        let h2 = survey_callback_hash(42, "topsecret");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 32);
    }

    #[test]
    fn test_verify_accepts_valid_hash() {
        let h = survey_callback_hash(7, "s3cr3t");
        assert!(verify_survey_callback(7, "s3cr3t", &h).is_ok());
        // 大写与前后空白也接受
        assert!(verify_survey_callback(7, "s3cr3t", &h.to_uppercase()).is_ok());
        assert!(verify_survey_callback(7, "s3cr3t", &format!(" {h} ")).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_inputs() {
        let h = survey_callback_hash(7, "s3cr3t");
        // 用户不同 / 密钥不同 / 哈希被篡改
        let cases = [
            (8, "s3cr3t", h.as_str()),
            (7, "other", h.as_str()),
            (7, "s3cr3t", "deadbeef"),
        ];
        for (uid, secret, hash) in cases {
            let err = verify_survey_callback(uid, secret, hash).unwrap_err();
            assert!(matches!(err, AppError::InvalidSignature));
        }
    }
}
