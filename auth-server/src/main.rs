// auth-server/src/main.rs
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use auth_server::{api, build_memory_service, middleware::RateLimiter};
use common::{setup_tracing, Config};

#[get("/")]
async fn index() -> impl Responder {
    HttpResponse::Ok().body("Auth Server")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = Config::from_env();
    setup_tracing(&config.server.log_level);

    if config.auth.secret_key == Config::default().auth.secret_key {
        tracing::warn!("Using the default signing secret, set APP__AUTH__SECRET_KEY in production");
    }

    let server_addr = config.server.addr.clone();
    tracing::info!("Starting Auth Server on {}", server_addr);

    let service = web::Data::new(build_memory_service(&config));
    let limiter = RateLimiter::for_auth(api::AUTH_SCOPE, &config.rate_limit);

    HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .service(index)
            .configure(api::configure(limiter.clone()))
    })
    .bind(&server_addr)?
    .run()
    .await
}
