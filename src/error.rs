use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Permission denied")]
    PermissionDenied,

    /// 幂等检查命中已有发放记录。对调用方不算失败, 而是"已完成"信号,
    /// handler 层会把它转成成功响应。
    #[error("Already awarded: {0}")]
    AlreadyAwarded(String),

    /// 目标期已开奖或开奖时间已过, 拒绝任何投入/结算操作
    #[error("Draw closed: {0}")]
    DrawClosed(String),

    #[error("Insufficient tickets: requested {requested}, available {available}")]
    InsufficientTickets { requested: i64, available: i64 },

    /// 回调签名校验失败, 按安全事件记录, 绝不触碰账本
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                (
                    actix_web::http::StatusCode::UNAUTHORIZED,
                    "AUTH_ERROR",
                    msg.clone(),
                )
            }
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::Forbidden => {
                log::warn!("Forbidden access");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Forbidden".to_string(),
                )
            }
            AppError::PermissionDenied => {
                log::warn!("Permission denied");
                (
                    actix_web::http::StatusCode::FORBIDDEN,
                    "FORBIDDEN",
                    "Permission denied".to_string(),
                )
            }
            AppError::AlreadyAwarded(msg) => {
                // 正常路径的重复请求, 对外是"已完成"的成功信号
                log::info!("Duplicate award attempt: {msg}");
                return HttpResponse::Ok().json(json!({
                    "success": true,
                    "message": msg,
                    "already_awarded": true
                }));
            }
            AppError::DrawClosed(msg) => {
                log::warn!("Draw closed: {msg}");
                (
                    actix_web::http::StatusCode::CONFLICT,
                    "DRAW_CLOSED",
                    msg.clone(),
                )
            }
            AppError::InsufficientTickets {
                requested,
                available,
            } => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "INSUFFICIENT_TICKETS",
                format!("Requested {requested} tickets but only {available} available"),
            ),
            AppError::InvalidSignature => {
                // 安全事件, 与普通校验错误区分记录
                log::warn!("SECURITY: invalid callback signature");
                (
                    actix_web::http::StatusCode::UNAUTHORIZED,
                    "INVALID_SIGNATURE",
                    "Invalid signature".to_string(),
                )
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "EXTERNAL_API_ERROR",
                    msg.clone(),
                )
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}
