use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use luckypaisa_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::EmailNotifier,
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().expect("Failed to load configuration file");

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .expect("Failed to create database connection pool");

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // 创建JWT服务
    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 创建外部服务
    let email_notifier = EmailNotifier::new(config.email.clone());

    // 创建服务
    let settings_service = SettingsService::new(pool.clone());
    let user_service = UserService::new(pool.clone(), settings_service.clone());
    let draw_service = DrawService::new(
        pool.clone(),
        settings_service.clone(),
        config.lottery.clone(),
    );
    let ticket_service = TicketService::new(pool.clone(), settings_service.clone());
    let participation_service = ParticipationService::new(pool.clone());
    let resolution_service = ResolutionService::new(pool.clone(), settings_service.clone());
    let reconciliation_service = ReconciliationService::new(pool.clone());

    let survey_config = config.survey.clone();

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::Data::new(survey_config.clone()))
            .app_data(web::Data::new(email_notifier.clone()))
            .app_data(web::Data::new(settings_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(draw_service.clone()))
            .app_data(web::Data::new(ticket_service.clone()))
            .app_data(web::Data::new(participation_service.clone()))
            .app_data(web::Data::new(resolution_service.clone()))
            .app_data(web::Data::new(reconciliation_service.clone()))
            .configure(swagger_config)
            .configure(handlers::webhook_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::lottery_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
