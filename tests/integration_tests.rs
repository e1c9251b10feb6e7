use auction_market::auth::{Authenticator, PostgresAuthenticator, RegisterForm};
use auction_market::database::DatabaseManager;
use auction_market::error::AppError;
use auction_market::listing::commands::{
    self, BidForm, CommentForm, ListingForm, WatchlistAction, BID_REJECTED_MESSAGE,
};
use auction_market::listing::model::User;
use auction_market::query;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// 데이터베이스 매니저 설정
async fn setup() -> Arc<DatabaseManager> {
    dotenvy::dotenv().ok();
    let db_manager = Arc::new(DatabaseManager::new().await);
    db_manager
        .initialize_database()
        .await
        .expect("스키마 초기화 실패");
    db_manager
}

/// 테스트 간 충돌 방지용 유일한 이름 생성
fn unique(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}_{}", prefix, nanos)
}

/// 테스트용 사용자 등록
async fn register_test_user(db_manager: &Arc<DatabaseManager>, prefix: &str) -> User {
    let authenticator = PostgresAuthenticator::new(Arc::clone(db_manager));
    let username = unique(prefix);
    authenticator
        .register(RegisterForm {
            username: username.clone(),
            email: format!("{}@example.com", username),
            password: "pass1234".to_string(),
            confirmation: "pass1234".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        })
        .await
        .expect("회원 가입 실패")
}

/// 테스트용 리스팅 생성 (새 카테고리 포함)
async fn create_test_listing(
    db_manager: &DatabaseManager,
    owner_id: i64,
    starting_price: i64,
) -> i64 {
    let form = ListingForm {
        title: unique("item"),
        description: "통합 테스트용 리스팅입니다.".to_string(),
        starting_price: starting_price.to_string(),
        new_category: unique("category"),
        ..ListingForm::default()
    };
    commands::handle_create_listing(form, Some(owner_id), db_manager)
        .await
        .expect("리스팅 생성 실패")
}

/// 홈 화면 필터: 진행 중인 리스팅만 포함
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_homepage_excludes_closed_listings() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;

    let open_id = create_test_listing(&db_manager, owner.id, 100).await;
    let closed_id = create_test_listing(&db_manager, owner.id, 100).await;
    commands::handle_close_listing(closed_id, Some(owner.id), &db_manager)
        .await
        .unwrap();

    let active = query::handlers::list_active_listings(&db_manager)
        .await
        .unwrap();
    let ids: Vec<i64> = active.iter().map(|l| l.id).collect();
    assert!(ids.contains(&open_id));
    assert!(!ids.contains(&closed_id));
    assert!(active.iter().all(|l| !l.is_closed));
}

/// 같은 username 재등록은 Conflict, 두 번째 행은 저장되지 않는다
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_username_is_rejected() {
    let db_manager = setup().await;
    let authenticator = PostgresAuthenticator::new(Arc::clone(&db_manager));

    let username = unique("dup");
    let form = RegisterForm {
        username: username.clone(),
        email: format!("{}@example.com", username),
        password: "pass1234".to_string(),
        confirmation: "pass1234".to_string(),
        ..RegisterForm::default()
    };

    authenticator.register(form.clone()).await.unwrap();
    let err = authenticator.register(form).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = $1")
        .bind(&username)
        .fetch_one(db_manager.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

/// 입찰 수락 테이블: 시작가 100에서 99 거절 / 100 수락,
/// 기존 최고가 150에서 150 거절 / 151 수락
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_bid_acceptance_rule() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let bidder = register_test_user(&db_manager, "bidder").await;
    let listing_id = create_test_listing(&db_manager, owner.id, 100).await;

    let place = |price: &str| {
        commands::handle_place_bid(
            listing_id,
            BidForm {
                price: price.to_string(),
            },
            Some(bidder.id),
            &db_manager,
        )
    };

    // 폼 수준 검증
    assert!(matches!(
        place("abc").await.unwrap_err(),
        AppError::Validation(_)
    ));

    // 시작가 미만
    let err = place("99").await.unwrap_err();
    match err {
        AppError::Validation(errors) => {
            assert_eq!(errors[0].message, BID_REJECTED_MESSAGE);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // 시작가 동액은 수락
    place("100").await.unwrap();
    place("150").await.unwrap();

    // 기존 최고가 동액은 거절, 초과만 수락
    assert!(matches!(
        place("150").await.unwrap_err(),
        AppError::Validation(_)
    ));
    place("151").await.unwrap();

    let listing = query::handlers::get_listing(&db_manager, listing_id)
        .await
        .unwrap();
    assert_eq!(listing.current_price, Some(151));
}

/// 종료된 경매는 입찰을 받지 않는다
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_closed_listing_rejects_bids() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let bidder = register_test_user(&db_manager, "bidder").await;
    let listing_id = create_test_listing(&db_manager, owner.id, 100).await;

    commands::handle_close_listing(listing_id, Some(owner.id), &db_manager)
        .await
        .unwrap();

    let err = commands::handle_place_bid(
        listing_id,
        BidForm {
            price: "200".to_string(),
        },
        Some(bidder.id),
        &db_manager,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

/// 관심 목록 추가/제거는 양방향 모두 멱등
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_watchlist_toggle_is_idempotent() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let watcher = register_test_user(&db_manager, "watcher").await;
    let listing_id = create_test_listing(&db_manager, owner.id, 100).await;

    let watch_count = || async {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM watchlist WHERE user_id = $1 AND listing_id = $2",
        )
        .bind(watcher.id)
        .bind(listing_id)
        .fetch_one(db_manager.pool())
        .await
        .unwrap()
    };

    commands::handle_toggle_watchlist(
        listing_id,
        WatchlistAction::Add,
        Some(watcher.id),
        &db_manager,
    )
    .await
    .unwrap();
    commands::handle_toggle_watchlist(
        listing_id,
        WatchlistAction::Add,
        Some(watcher.id),
        &db_manager,
    )
    .await
    .unwrap();
    assert_eq!(watch_count().await, 1);

    commands::handle_toggle_watchlist(
        listing_id,
        WatchlistAction::Remove,
        Some(watcher.id),
        &db_manager,
    )
    .await
    .unwrap();
    // 이미 제거된 뒤의 제거도 오류가 아니다
    commands::handle_toggle_watchlist(
        listing_id,
        WatchlistAction::Remove,
        Some(watcher.id),
        &db_manager,
    )
    .await
    .unwrap();
    assert_eq!(watch_count().await, 0);
}

/// 경매 종료: 소유자 전용, 재종료는 무해, 되돌릴 수 없다
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_close_is_idempotent_and_owner_only() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let other = register_test_user(&db_manager, "other").await;
    let listing_id = create_test_listing(&db_manager, owner.id, 100).await;

    let err = commands::handle_close_listing(listing_id, Some(other.id), &db_manager)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    commands::handle_close_listing(listing_id, Some(owner.id), &db_manager)
        .await
        .unwrap();
    commands::handle_close_listing(listing_id, Some(owner.id), &db_manager)
        .await
        .unwrap();

    let listing = query::handlers::get_listing(&db_manager, listing_id)
        .await
        .unwrap();
    assert!(listing.is_closed);
}

/// 새 카테고리 이름이 주어지면 드롭다운 선택을 무시하고
/// 항상 별도의 카테고리 행을 새로 만든다 (이름 중복 허용)
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_new_category_always_creates_fresh_row() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let category_name = unique("Toys");

    let first_form = ListingForm {
        title: unique("item"),
        description: "첫 리스팅".to_string(),
        starting_price: "10".to_string(),
        new_category: category_name.clone(),
        ..ListingForm::default()
    };
    let first_id = commands::handle_create_listing(first_form, Some(owner.id), &db_manager)
        .await
        .unwrap();
    let existing_category_id = query::handlers::get_listing(&db_manager, first_id)
        .await
        .unwrap()
        .category_id;

    // 드롭다운으로 기존 카테고리를 고르면서 같은 이름을 새 카테고리로도 제출
    let second_form = ListingForm {
        title: unique("item"),
        description: "둘째 리스팅".to_string(),
        starting_price: "10".to_string(),
        category: existing_category_id.to_string(),
        new_category: category_name.clone(),
        ..ListingForm::default()
    };
    let second_id = commands::handle_create_listing(second_form, Some(owner.id), &db_manager)
        .await
        .unwrap();
    let second_category_id = query::handlers::get_listing(&db_manager, second_id)
        .await
        .unwrap()
        .category_id;

    assert_ne!(second_category_id, existing_category_id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE name = $1")
        .bind(&category_name)
        .fetch_one(db_manager.pool())
        .await
        .unwrap();
    assert_eq!(count, 2);
}

/// 댓글: 빈 본문은 거절, 저장된 댓글은 상세 뷰에 작성자와 함께 나타난다
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_comments_attach_to_listing() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let commenter = register_test_user(&db_manager, "commenter").await;
    let listing_id = create_test_listing(&db_manager, owner.id, 100).await;

    let err = commands::handle_add_comment(
        listing_id,
        CommentForm {
            text: "   ".to_string(),
        },
        Some(commenter.id),
        &db_manager,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    commands::handle_add_comment(
        listing_id,
        CommentForm {
            text: "Nice item!".to_string(),
        },
        Some(commenter.id),
        &db_manager,
    )
    .await
    .unwrap();

    // 비로그인 조회: 댓글은 보이고 호출자 조건부 값은 비어 있다
    let view = query::handlers::listing_detail(&db_manager, listing_id, None)
        .await
        .unwrap();
    assert_eq!(view.comments.len(), 1);
    assert_eq!(view.comments[0].body, "Nice item!");
    assert_eq!(view.comments[0].author, commenter.username);
    assert!(!view.in_watchlist);
    assert!(!view.can_close);
    assert!(view.winner_announcement.is_none());
    assert!(view.bid_form.price.is_empty());
    assert!(view.comment_form.text.is_empty());
}

/// 종단 간: 소유자 플래그, 관심 목록, 낙찰 안내
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_watchlist_and_close_permissions_end_to_end() {
    let db_manager = setup().await;
    let user_a = register_test_user(&db_manager, "seller").await;
    let user_b = register_test_user(&db_manager, "buyer").await;
    let listing_id = create_test_listing(&db_manager, user_a.id, 50).await;

    commands::handle_place_bid(
        listing_id,
        BidForm {
            price: "60".to_string(),
        },
        Some(user_b.id),
        &db_manager,
    )
    .await
    .unwrap();

    let view_a = query::handlers::listing_detail(&db_manager, listing_id, Some(user_a.id))
        .await
        .unwrap();
    assert!(view_a.can_close);

    let view_b = query::handlers::listing_detail(&db_manager, listing_id, Some(user_b.id))
        .await
        .unwrap();
    assert!(!view_b.can_close);
    assert!(!view_b.in_watchlist);

    commands::handle_toggle_watchlist(
        listing_id,
        WatchlistAction::Add,
        Some(user_b.id),
        &db_manager,
    )
    .await
    .unwrap();
    let watched = query::handlers::list_watchlist(&db_manager, Some(user_b.id))
        .await
        .unwrap();
    assert!(watched.iter().any(|l| l.id == listing_id));

    // 종료 후에는 현재 입찰자가 낙찰자로 안내된다
    commands::handle_close_listing(listing_id, Some(user_a.id), &db_manager)
        .await
        .unwrap();
    let view_closed = query::handlers::listing_detail(&db_manager, listing_id, Some(user_b.id))
        .await
        .unwrap();
    assert_eq!(
        view_closed.winner_announcement,
        Some(format!(
            "This auction listing is won by {}",
            user_b.display_name()
        ))
    );
}

/// 비로그인 호출은 모든 보호 동작에서 Unauthorized
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_unauthenticated_callers_are_rejected() {
    let db_manager = setup().await;
    let owner = register_test_user(&db_manager, "owner").await;
    let listing_id = create_test_listing(&db_manager, owner.id, 100).await;

    assert!(matches!(
        commands::handle_create_listing(ListingForm::default(), None, &db_manager)
            .await
            .unwrap_err(),
        AppError::Unauthorized
    ));
    assert!(matches!(
        commands::handle_place_bid(
            listing_id,
            BidForm {
                price: "200".to_string()
            },
            None,
            &db_manager
        )
        .await
        .unwrap_err(),
        AppError::Unauthorized
    ));
    assert!(matches!(
        commands::handle_add_comment(
            listing_id,
            CommentForm {
                text: "hello".to_string()
            },
            None,
            &db_manager
        )
        .await
        .unwrap_err(),
        AppError::Unauthorized
    ));
    assert!(matches!(
        commands::handle_close_listing(listing_id, None, &db_manager)
            .await
            .unwrap_err(),
        AppError::Unauthorized
    ));
    assert!(matches!(
        commands::handle_toggle_watchlist(listing_id, WatchlistAction::Add, None, &db_manager)
            .await
            .unwrap_err(),
        AppError::Unauthorized
    ));
    assert!(matches!(
        query::handlers::list_watchlist(&db_manager, None)
            .await
            .unwrap_err(),
        AppError::Unauthorized
    ));
    assert!(matches!(
        query::handlers::list_categories(&db_manager, None)
            .await
            .unwrap_err(),
        AppError::Unauthorized
    ));
}

/// 존재하지 않는 카테고리 조회는 NotFound
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_missing_category_is_not_found() {
    let db_manager = setup().await;
    let err = query::handlers::list_listings_by_category(&db_manager, i64::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("category")));
}

/// HTTP 종단 간 흐름: 가입 -> 리스팅 생성 -> 입찰 거절/수락 -> 상세 확인
#[tokio::test]
#[ignore = "requires a running server on localhost:3000 and PostgreSQL"]
async fn test_http_end_to_end_flow() {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    let username = unique("http");

    // 회원 가입 (세션 쿠키 획득, 홈으로 리다이렉트)
    let response = client
        .post("http://localhost:3000/register")
        .form(&[
            ("username", username.as_str()),
            ("email", "http@example.com"),
            ("password", "pass1234"),
            ("confirmation", "pass1234"),
        ])
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // 리스팅 생성 후 상세 페이지로 리다이렉트
    let category = unique("category");
    let response = client
        .post("http://localhost:3000/create")
        .form(&[
            ("title", "HTTP test item"),
            ("description", "created by the end-to-end test"),
            ("starting_price", "40"),
            ("new_category", category.as_str()),
        ])
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let listing_path = response.url().path().to_string();
    assert!(listing_path.starts_with("/listing/"));

    // 시작가 미만 입찰은 거절 메시지와 함께 상세를 다시 렌더링
    let response = client
        .post(format!("http://localhost:3000{}/bid", listing_path))
        .form(&[("price", "39")])
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], BID_REJECTED_MESSAGE);
    assert_eq!(body["bid_form"]["price"], "39");

    // 시작가 동액 입찰은 수락
    let response = client
        .post(format!("http://localhost:3000{}/bid", listing_path))
        .form(&[("price", "40")])
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    // 상세 조회로 현재 입찰 확인
    let detail: serde_json::Value = client
        .get(format!("http://localhost:3000{}", listing_path))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .unwrap();
    assert_eq!(detail["current_bid"]["price"], 40);
    assert_eq!(detail["can_close"], true);
}
