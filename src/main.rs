use actix_web::{App, HttpServer, middleware, web};

use agrirapport::auth;
use agrirapport::config::AppConfig;
use agrirapport::db;
use agrirapport::handlers;
use agrirapport::processing::client::MicroserviceClient;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    if config.webhook_secret.is_none() {
        log::warn!("WEBHOOK_SECRET not set: inbound webhook signatures will NOT be verified");
    }

    if let Some(parent) = std::path::Path::new(&config.database_path).parent() {
        std::fs::create_dir_all(parent).expect("Failed to create data directory");
    }

    let pool = db::init_pool(&config.database_path);
    db::run_migrations(&pool);

    let admin_hash = auth::password::hash_password(
        &std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
    )
    .expect("Failed to hash default password");
    db::seed_admin(&pool, &admin_hash);

    let service = MicroserviceClient::new(&config.service);
    let bind_addr = config.bind_addr.clone();

    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(service.clone()))
            // Public: login and signature-authenticated webhooks
            .route("/api/auth/login", web::post().to(handlers::auth_handlers::login))
            .configure(handlers::webhook_handlers::configure)
            // Everything else requires a bearer token
            .service(
                web::scope("/api")
                    .wrap(middleware::from_fn(auth::middleware::require_auth))
                    .route("/auth/logout", web::post().to(handlers::auth_handlers::logout))
                    .route("/users", web::post().to(handlers::user_handlers::create))
                    // Gesuch orchestration
                    .route("/gesuche", web::post().to(handlers::gesuch_handlers::upload))
                    .route("/gesuche", web::get().to(handlers::gesuch_handlers::list))
                    .route("/gesuche/{id}", web::get().to(handlers::gesuch_handlers::detail))
                    .route("/gesuche/{id}/status", web::get().to(handlers::gesuch_handlers::status))
                    .route(
                        "/gesuche/{id}/teilprojekte",
                        web::post().to(handlers::gesuch_handlers::create_teilprojekte),
                    )
                    .route(
                        "/gesuche/{id}/rapporte/generate",
                        web::post().to(handlers::gesuch_handlers::generate_rapporte),
                    )
                    .route("/gesuche/{id}/export", web::post().to(handlers::gesuch_handlers::export))
                    // Rapport lifecycle — /rapporte/anfordern BEFORE /rapporte/{id}
                    .route("/rapporte", web::post().to(handlers::rapport_handlers::crud::create))
                    .route("/rapporte", web::get().to(handlers::rapport_handlers::crud::list))
                    .route(
                        "/rapporte/anfordern",
                        web::post().to(handlers::rapport_handlers::crud::request),
                    )
                    .route("/rapporte/{id}", web::get().to(handlers::rapport_handlers::crud::detail))
                    .route("/rapporte/{id}", web::put().to(handlers::rapport_handlers::crud::update))
                    .route(
                        "/rapporte/{id}",
                        web::delete().to(handlers::rapport_handlers::crud::delete),
                    )
                    .route(
                        "/rapporte/{id}/submit",
                        web::post().to(handlers::rapport_handlers::workflow::submit),
                    )
                    .route(
                        "/rapporte/{id}/approve",
                        web::post().to(handlers::rapport_handlers::workflow::approve),
                    ),
            )
    })
    .bind(&bind_addr)?
    .run()
    .await
}
