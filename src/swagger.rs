use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{DrawStatus, TicketSource};
use crate::handlers;
use crate::models::*;
use crate::services::{BatchReconcileReport, DrawReconcileReport, UserReconcileReport};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::lottery::get_current_draw,
        handlers::lottery::apply_tickets,
        handlers::lottery::claim_social_follow,
        handlers::lottery::list_my_tickets,
        handlers::lottery::list_winners,
        handlers::admin::resolve_draw,
        handlers::admin::reset_lottery,
        handlers::admin::update_prize,
        handlers::admin::block_user,
        handlers::admin::unblock_user,
        handlers::admin::issue_ticket,
        handlers::admin::claim_prize,
        handlers::admin::reconcile,
        handlers::admin::audit_logs,
    ),
    components(
        schemas(
            TicketSource,
            DrawStatus,
            TicketResponse,
            TicketListQuery,
            ApplyTicketsResponse,
            IssueTicketResponse,
            DrawResponse,
            CurrentDrawResponse,
            WinnerResponse,
            WinnerListQuery,
            UserTicketSummary,
            SurveyCallbackQuery,
            SurveyCallbackAck,
            ResolveDrawRequest,
            UpdatePrizeRequest,
            AdminIssueTicketRequest,
            ClaimPrizeRequest,
            BlockUserRequest,
            ReconcileRequest,
            ResetLotteryResponse,
            UserReconcileReport,
            BatchReconcileReport,
            DrawReconcileReport,
            PaginationParams,
            ApiError,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "lottery", description = "Lottery and ticket API"),
        (name = "admin", description = "Admin operations API"),
    ),
    info(
        title = "LuckyPaisa Backend API",
        version = "1.0.0",
        description = "LuckyPaisa Backend REST API documentation",
        contact(
            name = "API Support",
            email = "support@luckypaisa.in"
        )
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
