use crate::entities::TicketSource;
use crate::external::EmailNotifier;
use crate::models::*;
use crate::services::{DrawService, ParticipationService, TicketService, UserService};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// 从请求扩展中获取用户ID（中间件在鉴权后注入）
fn get_user_id_from_request(req: &HttpRequest) -> Option<i64> {
    req.extensions().get::<i64>().copied()
}

#[utoipa::path(
    get,
    path = "/lottery/current",
    tag = "lottery",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "当前期与调用者参与情况", body = CurrentDrawResponse),
        (status = 401, description = "未授权")
    )
)]
/// 当前期状态 + 调用者的可用/累计奖券与本期投入 (纯读)
pub async fn get_current_draw(
    draw_service: web::Data<DrawService>,
    participation_service: web::Data<ParticipationService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req).unwrap_or(0);

    let result: crate::error::AppResult<CurrentDrawResponse> = async {
        let draw = draw_service.get_or_create_current_draw().await?;
        let summary = user_service.get_ticket_summary(user_id).await?;
        let participation = participation_service
            .find_participation(user_id, draw.id)
            .await?;

        Ok(CurrentDrawResponse {
            draw: draw.into(),
            available_tickets: summary.available_tickets,
            total_tickets_earned: summary.total_tickets_earned,
            my_tickets_in_draw: participation.map(|p| p.tickets_used).unwrap_or(0),
            has_won: summary.has_won,
        })
    }
    .await;

    match result {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lottery/apply",
    tag = "lottery",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "投入成功", body = ApplyTicketsResponse),
        (status = 401, description = "未授权"),
        (status = 409, description = "本期已关闭")
    )
)]
/// 把调用者的全部可用奖券投入当前期。
/// 没有可投奖券时返回 applied=0, 不算错误。
pub async fn apply_tickets(
    draw_service: web::Data<DrawService>,
    participation_service: web::Data<ParticipationService>,
    user_service: web::Data<UserService>,
    email: web::Data<EmailNotifier>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req).unwrap_or(0);

    let result: crate::error::AppResult<ApplyTicketsResponse> = async {
        let draw = draw_service.get_or_create_current_draw().await?;
        let applied = participation_service
            .apply_available_tickets(user_id, draw.id, None)
            .await?;
        let summary = user_service.get_ticket_summary(user_id).await?;
        Ok(ApplyTicketsResponse {
            draw_id: draw.id,
            applied,
            remaining_available: summary.available_tickets,
        })
    }
    .await;

    match result {
        Ok(data) => {
            // 账本已提交, 通知即发即忘
            if data.applied > 0
                && let Ok(user) = user_service.find_user(user_id).await
                && let Some(address) = user.email
            {
                let notifier = email.get_ref().clone();
                let applied = data.applied;
                tokio::spawn(async move {
                    notifier.notify_tickets_applied(&address, applied).await;
                });
            }
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/lottery/social-follow",
    tag = "lottery",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "发放成功或已发放过", body = IssueTicketResponse),
        (status = 401, description = "未授权")
    )
)]
/// 社交关注奖励: 每个用户一生一张。
/// 重复领取返回已发放信号, 奖券留在可用池, 由用户自行投入。
pub async fn claim_social_follow(
    ticket_service: web::Data<TicketService>,
    user_service: web::Data<UserService>,
    email: web::Data<EmailNotifier>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req).unwrap_or(0);

    match ticket_service
        .issue_ticket(
            user_id,
            TicketSource::Social,
            None,
            &format!("user:{user_id}"),
        )
        .await
    {
        Ok(ticket) => {
            let summary = match user_service.get_ticket_summary(user_id).await {
                Ok(s) => s,
                Err(e) => return Ok(e.error_response()),
            };

            if let Ok(user) = user_service.find_user(user_id).await
                && let Some(address) = user.email
            {
                let notifier = email.get_ref().clone();
                let code = ticket.confirmation_code.clone();
                tokio::spawn(async move {
                    notifier.notify_ticket_issued(&address, &code).await;
                });
            }

            let data = IssueTicketResponse {
                ticket: ticket.into(),
                available_tickets: summary.available_tickets,
                total_tickets_earned: summary.total_tickets_earned,
            };
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lottery/tickets",
    tag = "lottery",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "奖券列表"),
        (status = 401, description = "未授权")
    )
)]
/// 分页获取调用者的奖券（倒序）
pub async fn list_my_tickets(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<TicketListQuery>,
) -> Result<HttpResponse> {
    let user_id = get_user_id_from_request(&req).unwrap_or(0);
    match user_service.list_tickets(user_id, &query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/lottery/winners",
    tag = "lottery",
    params(
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "历史中奖记录"),
        (status = 401, description = "未授权")
    )
)]
/// 历史中奖记录（倒序, 纯读）
pub async fn list_winners(
    draw_service: web::Data<DrawService>,
    query: web::Query<WinnerListQuery>,
) -> Result<HttpResponse> {
    match draw_service.list_winners(&query.into_inner()).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn lottery_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/lottery")
            .route("/current", web::get().to(get_current_draw))
            .route("/apply", web::post().to(apply_tickets))
            .route("/social-follow", web::post().to(claim_social_follow))
            .route("/tickets", web::get().to(list_my_tickets))
            .route("/winners", web::get().to(list_winners)),
    );
}
