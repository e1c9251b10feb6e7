// region:    --- Imports
use crate::auth::{
    AuthSession, Authenticator, LoginForm, PostgresAuthenticator, RegisterForm,
};
use crate::database::DatabaseManager;
use crate::error::AppError;
use crate::listing::commands::{
    self, BidForm, CommentForm, ListingForm, WatchlistAction, WatchlistForm,
};
use crate::listing::model::{CreateListingView, LoginView, RegisterView};
use crate::query;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use std::sync::Arc;
use tower_sessions::Session;
use tracing::info;

// endregion: --- Imports

// region:    --- Page Handlers

/// 홈: 진행 중인 리스팅 목록
pub async fn handle_index(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
) -> Result<impl IntoResponse, AppError> {
    info!("{:<12} --> 홈 요청 처리", "Handler");
    let listings = query::handlers::list_active_listings(&db_manager).await?;
    Ok(Json(listings))
}

/// 리스팅 상세 조회
pub async fn handle_listing_detail(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Path(listing_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    info!("{:<12} --> 리스팅 상세 요청 처리 id: {}", "Handler", listing_id);
    let caller = AuthSession::new(&session).user_id().await?;
    let view = query::handlers::listing_detail(&db_manager, listing_id, caller).await?;
    Ok(Json(view))
}

/// 리스팅 상세 POST: 관심 목록 토글 후 상세를 다시 렌더링한다
pub async fn handle_watchlist_toggle(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Path(listing_id): Path<i64>,
    Form(form): Form<WatchlistForm>,
) -> Result<impl IntoResponse, AppError> {
    info!(
        "{:<12} --> 관심 목록 토글 요청 처리 id: {}",
        "Handler", listing_id
    );
    let caller = AuthSession::new(&session).user_id().await?;
    let action = WatchlistAction::parse(&form.action)?;
    commands::handle_toggle_watchlist(listing_id, action, caller, &db_manager).await?;
    let view = query::handlers::listing_detail(&db_manager, listing_id, caller).await?;
    Ok(Json(view))
}

/// 카테고리 목록
pub async fn handle_categories(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    info!("{:<12} --> 카테고리 목록 요청 처리", "Handler");
    let caller = AuthSession::new(&session).user_id().await?;
    let categories = query::handlers::list_categories(&db_manager, caller).await?;
    Ok(Json(categories))
}

/// 단일 카테고리의 리스팅 목록
pub async fn handle_category(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    Path(category_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    info!(
        "{:<12} --> 카테고리 리스팅 요청 처리 id: {}",
        "Handler", category_id
    );
    let listings = query::handlers::list_listings_by_category(&db_manager, category_id).await?;
    Ok(Json(listings))
}

/// 관심 목록 페이지
pub async fn handle_watchlist(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    info!("{:<12} --> 관심 목록 요청 처리", "Handler");
    let caller = AuthSession::new(&session).user_id().await?;
    let listings = query::handlers::list_watchlist(&db_manager, caller).await?;
    Ok(Json(listings))
}

/// 존재하지 않는 경로
pub async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "page not found"})),
    )
}

// endregion: --- Page Handlers

// region:    --- Listing Command Handlers

/// 리스팅 작성 폼 (드롭다운용 카테고리 목록 포함)
pub async fn handle_create_form(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    info!("{:<12} --> 리스팅 작성 폼 요청 처리", "Handler");
    let caller = AuthSession::new(&session).user_id().await?;
    caller.ok_or(AppError::Unauthorized)?;
    let categories = query::handlers::list_categories(&db_manager, caller).await?;
    Ok(Json(CreateListingView {
        form: ListingForm::default(),
        categories,
        errors: Vec::new(),
    }))
}

/// 리스팅 생성
/// 검증 실패 시 입력값을 보존한 채 작성 폼을 다시 렌더링한다.
pub async fn handle_create(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Form(form): Form<ListingForm>,
) -> Result<Response, AppError> {
    info!("{:<12} --> 리스팅 생성 요청 처리", "Handler");
    let caller = AuthSession::new(&session).user_id().await?;

    match commands::handle_create_listing(form.clone(), caller, &db_manager).await {
        Ok(listing_id) => Ok(Redirect::to(&format!("/listing/{}", listing_id)).into_response()),
        Err(AppError::Validation(errors)) => {
            let categories = query::handlers::list_categories(&db_manager, caller).await?;
            Ok((
                StatusCode::BAD_REQUEST,
                Json(CreateListingView {
                    form,
                    categories,
                    errors,
                }),
            )
                .into_response())
        }
        Err(e) => Err(e),
    }
}

/// 입찰
/// 거절 시 시도한 입력값과 거절 메시지를 담아 상세를 다시 렌더링한다.
pub async fn handle_bid(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Path(listing_id): Path<i64>,
    Form(form): Form<BidForm>,
) -> Result<Response, AppError> {
    info!("{:<12} --> 입찰 요청 처리 id: {}", "Handler", listing_id);
    let caller = AuthSession::new(&session).user_id().await?;

    match commands::handle_place_bid(listing_id, form.clone(), caller, &db_manager).await {
        Ok(()) => Ok(Redirect::to(&format!("/listing/{}", listing_id)).into_response()),
        Err(AppError::Validation(errors)) => {
            let mut view =
                query::handlers::listing_detail(&db_manager, listing_id, caller).await?;
            view.error = Some(AppError::validation_message(&errors));
            view.bid_form = form;
            Ok((StatusCode::BAD_REQUEST, Json(view)).into_response())
        }
        Err(e) => Err(e),
    }
}

/// 댓글 작성
pub async fn handle_comment(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Path(listing_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    info!("{:<12} --> 댓글 요청 처리 id: {}", "Handler", listing_id);
    let caller = AuthSession::new(&session).user_id().await?;

    match commands::handle_add_comment(listing_id, form.clone(), caller, &db_manager).await {
        Ok(()) => Ok(Redirect::to(&format!("/listing/{}", listing_id)).into_response()),
        Err(AppError::Validation(errors)) => {
            let mut view =
                query::handlers::listing_detail(&db_manager, listing_id, caller).await?;
            view.error = Some(AppError::validation_message(&errors));
            view.comment_form = form;
            Ok((StatusCode::BAD_REQUEST, Json(view)).into_response())
        }
        Err(e) => Err(e),
    }
}

/// 경매 종료 (소유자 전용)
pub async fn handle_close(
    State((db_manager, _)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Path(listing_id): Path<i64>,
) -> Result<Redirect, AppError> {
    info!("{:<12} --> 경매 종료 요청 처리 id: {}", "Handler", listing_id);
    let caller = AuthSession::new(&session).user_id().await?;
    commands::handle_close_listing(listing_id, caller, &db_manager).await?;
    Ok(Redirect::to(&format!("/listing/{}", listing_id)))
}

// endregion: --- Listing Command Handlers

// region:    --- Auth Handlers

/// 로그인 폼
pub async fn handle_login_form() -> impl IntoResponse {
    Json(LoginView {
        username: String::new(),
        message: None,
    })
}

/// 로그인
/// 실패 시 시도한 username을 보존한 채 로그인 폼을 다시 렌더링한다.
pub async fn handle_login(
    State((_, authenticator)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    info!("{:<12} --> 로그인 요청 처리: {}", "Handler", form.username);

    match authenticator
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            AuthSession::new(&session).set_user_id(user.id).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Unauthorized) => Ok((
            StatusCode::UNAUTHORIZED,
            Json(LoginView {
                username: form.username,
                message: Some("Invalid username and/or password.".to_string()),
            }),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}

/// 로그아웃 (GET/POST 공용)
pub async fn handle_logout(session: Session) -> Redirect {
    info!("{:<12} --> 로그아웃 요청 처리", "Handler");
    AuthSession::new(&session).clear().await;
    Redirect::to("/")
}

/// 회원 가입 폼
pub async fn handle_register_form() -> impl IntoResponse {
    Json(RegisterView {
        username: String::new(),
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        message: None,
    })
}

/// 회원 가입
/// 검증 실패와 username 중복은 폼을 다시 렌더링한다 (비밀번호 제외 입력 보존).
pub async fn handle_register(
    State((_, authenticator)): State<(Arc<DatabaseManager>, Arc<PostgresAuthenticator>)>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    info!("{:<12} --> 회원 가입 요청 처리: {}", "Handler", form.username);

    let attempted = RegisterView {
        username: form.username.clone(),
        email: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        message: None,
    };

    match authenticator.register(form).await {
        Ok(user) => {
            AuthSession::new(&session).set_user_id(user.id).await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(AppError::Validation(errors)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(RegisterView {
                message: Some(AppError::validation_message(&errors)),
                ..attempted
            }),
        )
            .into_response()),
        Err(AppError::Conflict(message)) => Ok((
            StatusCode::CONFLICT,
            Json(RegisterView {
                message: Some(message),
                ..attempted
            }),
        )
            .into_response()),
        Err(e) => Err(e),
    }
}

// endregion: --- Auth Handlers
