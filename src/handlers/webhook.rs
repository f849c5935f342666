use crate::config::SurveyConfig;
use crate::entities::TicketSource;
use crate::error::AppError;
use crate::external::EmailNotifier;
use crate::models::{SurveyCallbackAck, SurveyCallbackQuery};
use crate::services::{DrawService, ParticipationService, TicketService, UserService};
use crate::utils::verify_survey_callback;
use actix_web::{HttpResponse, Result, web};
use log::{info, warn};

/// 问卷提供方回调处理器。
///
/// 流程: 先验签 (hash = md5(user_id + secret)), 验签失败按安全事件
/// 记录且零账本访问; 验签通过且状态为完成时按交易号幂等发券,
/// 然后立即投入当前期 (急切投入路径)。
/// 对提供方始终回 200, 避免无意义重试风暴。
pub async fn survey_callback(
    query: web::Query<SurveyCallbackQuery>,
    survey_config: web::Data<SurveyConfig>,
    ticket_service: web::Data<TicketService>,
    draw_service: web::Data<DrawService>,
    participation_service: web::Data<ParticipationService>,
    user_service: web::Data<UserService>,
    email: web::Data<EmailNotifier>,
) -> Result<HttpResponse> {
    let cb = query.into_inner();

    // 任何账本读写之前先验签
    if let Err(e) = verify_survey_callback(cb.user_id, &survey_config.callback_secret, &cb.hash) {
        warn!(
            "SECURITY: survey callback rejected for user {} tx {}: {e}",
            cb.user_id, cb.tx_id
        );
        return Ok(HttpResponse::Ok().json(SurveyCallbackAck::received()));
    }

    if !cb.is_success() {
        // 完成失败的回调只确认收到
        info!(
            "Survey callback for user {} tx {} reported status {:?}, no award",
            cb.user_id, cb.tx_id, cb.status
        );
        return Ok(HttpResponse::Ok().json(SurveyCallbackAck::received()));
    }

    let ticket = match ticket_service
        .issue_ticket(
            cb.user_id,
            TicketSource::Survey,
            Some(&cb.tx_id),
            "survey:callback",
        )
        .await
    {
        Ok(t) => t,
        Err(AppError::AlreadyAwarded(msg)) => {
            // 重复回调, 无第二张券, 照常确认
            info!("Survey callback duplicate for tx {}: {msg}", cb.tx_id);
            return Ok(HttpResponse::Ok().json(SurveyCallbackAck::duplicate()));
        }
        Err(e) => {
            log::error!(
                "Survey callback award failed for user {} tx {}: {e}",
                cb.user_id,
                cb.tx_id
            );
            // 回 200, 发放失败由提供方的下一次回调或人工补发兜底
            return Ok(HttpResponse::Ok().json(SurveyCallbackAck::error(format!("Award failed: {e}"))));
        }
    };

    // 急切投入: 问卷路径发券后立即投入当前期。
    // 投入失败不影响已提交的发券, 用户可稍后手动投入。
    match draw_service.get_or_create_current_draw().await {
        Ok(draw) => {
            if let Err(e) = participation_service
                .apply_available_tickets(cb.user_id, draw.id, None)
                .await
            {
                log::error!(
                    "Eager apply after survey award failed for user {}: {e}",
                    cb.user_id
                );
            }
        }
        Err(e) => {
            log::error!("Could not load current draw for eager apply: {e}");
        }
    }

    // 账本写入全部结束后再发通知, 即发即忘
    if let Ok(user) = user_service.find_user(cb.user_id).await
        && let Some(address) = user.email
    {
        let notifier = email.get_ref().clone();
        let code = ticket.confirmation_code.clone();
        tokio::spawn(async move {
            notifier.notify_ticket_issued(&address, &code).await;
        });
    }

    Ok(HttpResponse::Ok().json(SurveyCallbackAck::received()))
}

/// 路由配置 (公开路径, 靠签名而非JWT鉴权)
pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/webhook").route("/survey/callback", web::get().to(survey_callback)),
    );
}
