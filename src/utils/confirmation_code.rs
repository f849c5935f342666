use uuid::Uuid;

/// 生成奖券确认码 (用于审计与邮件引用, 全局唯一)
pub fn generate_confirmation_code() -> String {
    format!("TKT-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_code_format() {
        let code = generate_confirmation_code();
        assert!(code.starts_with("TKT-"));
        // "TKT-" + 32位十六进制
        assert_eq!(code.len(), 36);
    }

    #[test]
    fn test_confirmation_codes_are_unique() {
        let a = generate_confirmation_code();
        let b = generate_confirmation_code();
        assert_ne!(a, b);
    }
}
