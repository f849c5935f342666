use crate::external::EmailNotifier;
use crate::models::*;
use crate::services::{
    DrawService, ParticipationService, ReconciliationService, ResolutionService, SettingsService,
    TicketService, UserService,
};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// 管理端鉴权: JWT 注入的用户必须是管理员。
/// 返回审计用的操作者标识。
async fn require_admin_actor(
    user_service: &UserService,
    req: &HttpRequest,
) -> crate::error::AppResult<String> {
    let user_id = req.extensions().get::<i64>().copied().unwrap_or(0);
    let admin = user_service.require_admin(user_id).await?;
    Ok(format!("admin:{}", admin.id))
}

#[utoipa::path(
    post,
    path = "/admin/draw/resolve",
    tag = "admin",
    request_body = ResolveDrawRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "开奖成功", body = WinnerResponse),
        (status = 403, description = "无管理权限"),
        (status = 409, description = "该期已开奖")
    )
)]
/// 触发开奖。draw_id 缺省取当前期;
/// winner_user_id 缺省时按持券比例随机抽取。
pub async fn resolve_draw(
    user_service: web::Data<UserService>,
    draw_service: web::Data<DrawService>,
    resolution_service: web::Data<ResolutionService>,
    email: web::Data<EmailNotifier>,
    req: HttpRequest,
    body: web::Json<ResolveDrawRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };
    let body = body.into_inner();

    let result: crate::error::AppResult<WinnerResponse> = async {
        let draw_id = match body.draw_id {
            Some(id) => id,
            None => draw_service.get_or_create_current_draw().await?.id,
        };
        let winner = resolution_service
            .resolve_draw(draw_id, body.winner_user_id, &actor)
            .await?;
        Ok(winner.into())
    }
    .await;

    match result {
        Ok(winner) => {
            // 中奖通知在事务提交后即发即忘
            if let Ok(user) = user_service.find_user(winner.user_id).await
                && let Some(address) = user.email
            {
                let notifier = email.get_ref().clone();
                let prize = winner.prize_paise;
                tokio::spawn(async move {
                    notifier.notify_winner(&address, prize).await;
                });
            }
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": winner })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/draw/reset",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "重置成功", body = ResetLotteryResponse),
        (status = 403, description = "无管理权限")
    )
)]
/// 全系统奖券重置: 所有用户可用清零, 未消耗奖券作废。
/// 累计获得数不受影响。
pub async fn reset_lottery(
    user_service: web::Data<UserService>,
    resolution_service: web::Data<ResolutionService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };

    match resolution_service.reset_lottery(&actor).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/settings/prize",
    tag = "admin",
    request_body = UpdatePrizeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "更新成功"),
        (status = 403, description = "无管理权限")
    )
)]
/// 调整奖金。只影响之后创建的期, 已创建期的奖金是创建时的快照。
pub async fn update_prize(
    user_service: web::Data<UserService>,
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
    body: web::Json<UpdatePrizeRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };
    let body = body.into_inner();

    let result: crate::error::AppResult<()> = async {
        settings_service.set_prize_paise(body.prize_paise).await?;
        settings_service
            .record_audit(
                &actor,
                "update_prize",
                None,
                Some(&format!("{{\"prize_paise\":{}}}", body.prize_paise)),
            )
            .await?;
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Prize amount updated"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/block",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    request_body = BlockUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "拉黑成功", body = UserTicketSummary),
        (status = 403, description = "无管理权限"),
        (status = 404, description = "用户不存在")
    )
)]
/// 拉黑用户, 之后其一切奖券/开奖操作都被拒绝
pub async fn block_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<BlockUserRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };

    match user_service
        .set_blocked(path.into_inner(), true, &actor, body.reason.as_deref())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/unblock",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "用户ID")
    ),
    request_body = BlockUserRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "解禁成功", body = UserTicketSummary),
        (status = 403, description = "无管理权限"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn unblock_user(
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<BlockUserRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };

    match user_service
        .set_blocked(path.into_inner(), false, &actor, body.reason.as_deref())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/tickets/issue",
    tag = "admin",
    request_body = AdminIssueTicketRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "发券成功", body = TicketResponse),
        (status = 403, description = "无管理权限")
    )
)]
/// 手工/测试发券。apply=true 时立即投入当前期
/// (是否急切投入是调用侧的显式选择)。
pub async fn issue_ticket(
    user_service: web::Data<UserService>,
    ticket_service: web::Data<TicketService>,
    draw_service: web::Data<DrawService>,
    participation_service: web::Data<ParticipationService>,
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
    body: web::Json<AdminIssueTicketRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };
    let body = body.into_inner();

    let result: crate::error::AppResult<TicketResponse> = async {
        let ticket = ticket_service
            .issue_ticket(
                body.user_id,
                body.source,
                body.external_key.as_deref(),
                &actor,
            )
            .await?;

        if body.apply {
            let draw = draw_service.get_or_create_current_draw().await?;
            participation_service
                .apply_available_tickets(body.user_id, draw.id, None)
                .await?;
        }

        settings_service
            .record_audit(
                &actor,
                "admin_issue_ticket",
                Some(&format!("user:{}", body.user_id)),
                body.reason.as_deref(),
            )
            .await?;

        Ok(ticket.into())
    }
    .await;

    match result {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/winners/{id}/claim",
    tag = "admin",
    params(
        ("id" = i64, Path, description = "中奖记录ID")
    ),
    request_body = ClaimPrizeRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "兑换码发放成功", body = WinnerResponse),
        (status = 400, description = "已领取过"),
        (status = 403, description = "无管理权限"),
        (status = 404, description = "中奖记录不存在")
    )
)]
/// 为中奖记录发放兑换码, 恰好一次
pub async fn claim_prize(
    user_service: web::Data<UserService>,
    resolution_service: web::Data<ResolutionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<ClaimPrizeRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };

    match resolution_service
        .claim_prize(path.into_inner(), &body.coupon_code, &actor)
        .await
    {
        Ok(winner) => Ok(HttpResponse::Ok()
            .json(json!({ "success": true, "data": WinnerResponse::from(winner) }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/reconcile",
    tag = "admin",
    request_body = ReconcileRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "对账完成"),
        (status = 403, description = "无管理权限")
    )
)]
/// 对账。user_id 缺省时对全体用户和当前期执行。
/// 任何时刻重复执行都安全。
pub async fn reconcile(
    user_service: web::Data<UserService>,
    draw_service: web::Data<DrawService>,
    reconciliation_service: web::Data<ReconciliationService>,
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
    body: web::Json<ReconcileRequest>,
) -> Result<HttpResponse> {
    let actor = match require_admin_actor(&user_service, &req).await {
        Ok(a) => a,
        Err(e) => return Ok(e.error_response()),
    };
    let body = body.into_inner();

    let result: crate::error::AppResult<serde_json::Value> = async {
        let data = match body.user_id {
            Some(user_id) => {
                let report = reconciliation_service.reconcile_user(user_id).await?;
                json!({ "user": report })
            }
            None => {
                let users = reconciliation_service.reconcile_all_users().await?;
                let draw_report = match draw_service.find_current_draw().await? {
                    Some(draw) => Some(reconciliation_service.reconcile_draw(draw.id).await?),
                    None => None,
                };
                json!({ "users": users, "draw": draw_report })
            }
        };

        settings_service
            .record_audit(
                &actor,
                "reconcile",
                body.user_id.map(|id| format!("user:{id}")).as_deref(),
                None,
            )
            .await?;

        Ok(data)
    }
    .await;

    match result {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/audit-logs",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "最近审计记录"),
        (status = 403, description = "无管理权限")
    )
)]
/// 最近100条审计记录 (排障用)
pub async fn audit_logs(
    user_service: web::Data<UserService>,
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Err(e) = require_admin_actor(&user_service, &req).await {
        return Ok(e.error_response());
    }

    match settings_service.recent_audit_logs(100).await {
        Ok(rows) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": rows }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/draw/resolve", web::post().to(resolve_draw))
            .route("/draw/reset", web::post().to(reset_lottery))
            .route("/settings/prize", web::put().to(update_prize))
            .route("/users/{id}/block", web::post().to(block_user))
            .route("/users/{id}/unblock", web::post().to(unblock_user))
            .route("/tickets/issue", web::post().to(issue_ticket))
            .route("/winners/{id}/claim", web::post().to(claim_prize))
            .route("/reconcile", web::post().to(reconcile))
            .route("/audit-logs", web::get().to(audit_logs)),
    );
}
