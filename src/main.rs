use std::io;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

use todo_api::auth::{AuthMiddleware, AuthService};
use todo_api::config::Config;
use todo_api::db::{self, Store};
use todo_api::routes;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    if config.uses_default_secrets() {
        log::warn!("JWT_SECRET or SESSION_SECRET not set, using development defaults");
    }

    let store = db::connect(&config)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let auth = web::Data::new(AuthService::from_config(&config));
    let store_data: web::Data<dyn Store> = web::Data::from(store.clone());
    let config_data = web::Data::new(config.clone());

    log::info!(
        "Starting todo API at {} ({} store)",
        config.server_url(),
        store.backend()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware)
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(config_data.clone())
            .app_data(auth.clone())
            .app_data(store_data.clone())
            .configure(routes::config)
            .default_service(web::route().to(routes::not_found))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await?;

    store.close().await;
    log::info!("Server stopped");
    Ok(())
}
