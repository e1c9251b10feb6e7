// region:    --- Imports
use crate::auth::PostgresAuthenticator;
use crate::database::DatabaseManager;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_sessions::{MemoryStore, SessionManagerLayer};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Modules
mod auth;
mod database;
mod error;
mod handlers;
mod listing;
mod query;

// endregion: --- Modules

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // .env 로드 (없어도 무방)
    dotenvy::dotenv().ok();

    // DatabaseManager 생성
    let db_manager = Arc::new(DatabaseManager::new().await);

    // 스키마 초기화
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // 인증 서브시스템 생성
    let authenticator = Arc::new(PostgresAuthenticator::new(Arc::clone(&db_manager)));

    // 세션 쿠키 레이어 (저장소 교체는 배포 구성의 몫)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store).with_secure(false);

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let routes_all = Router::new()
        .route("/", get(handlers::handle_index))
        .route(
            "/login",
            get(handlers::handle_login_form).post(handlers::handle_login),
        )
        .route(
            "/logout",
            get(handlers::handle_logout).post(handlers::handle_logout),
        )
        .route(
            "/register",
            get(handlers::handle_register_form).post(handlers::handle_register),
        )
        .route(
            "/create",
            get(handlers::handle_create_form).post(handlers::handle_create),
        )
        .route(
            "/listing/:id",
            get(handlers::handle_listing_detail).post(handlers::handle_watchlist_toggle),
        )
        .route("/listing/:id/close", post(handlers::handle_close))
        .route("/listing/:id/comment", post(handlers::handle_comment))
        .route("/listing/:id/bid", post(handlers::handle_bid))
        .route("/categories", get(handlers::handle_categories))
        .route("/categories/:id", get(handlers::handle_category))
        .route("/watchlist", get(handlers::handle_watchlist))
        .fallback(handlers::handle_not_found)
        .layer(cors)
        .layer(session_layer)
        .with_state((db_manager, authenticator));

    // 리스너 생성
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&bind_addr).await.unwrap();
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr().unwrap()
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
