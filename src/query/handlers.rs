// region:    --- Imports
use super::queries;
use crate::database::DatabaseManager;
use crate::error::AppError;
use crate::listing::commands::{BidForm, CommentForm};
use crate::listing::model::{Category, CommentView, CurrentBid, Listing, ListingDetailView};
use tracing::info;

// endregion: --- Imports

// region:    --- Query Handlers

/// 진행 중인 리스팅 목록 조회
pub async fn list_active_listings(db_manager: &DatabaseManager) -> Result<Vec<Listing>, AppError> {
    info!("{:<12} --> 진행 중인 리스팅 목록 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                Ok(sqlx::query_as::<_, Listing>(queries::LIST_ACTIVE_LISTINGS)
                    .fetch_all(&mut **tx)
                    .await?)
            })
        })
        .await
}

/// 카테고리별 리스팅 조회 (종료된 리스팅 포함)
pub async fn list_listings_by_category(
    db_manager: &DatabaseManager,
    category_id: i64,
) -> Result<Vec<Listing>, AppError> {
    info!(
        "{:<12} --> 카테고리별 리스팅 조회 id: {}",
        "Query", category_id
    );
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Category>(queries::GET_CATEGORY)
                    .bind(category_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("category"))?;

                Ok(
                    sqlx::query_as::<_, Listing>(queries::LIST_LISTINGS_BY_CATEGORY)
                        .bind(category_id)
                        .fetch_all(&mut **tx)
                        .await?,
                )
            })
        })
        .await
}

/// 사용자 관심 목록 조회
pub async fn list_watchlist(
    db_manager: &DatabaseManager,
    caller: Option<i64>,
) -> Result<Vec<Listing>, AppError> {
    let user_id = caller.ok_or(AppError::Unauthorized)?;
    info!("{:<12} --> 관심 목록 조회 user: {}", "Query", user_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                Ok(
                    sqlx::query_as::<_, Listing>(queries::LIST_WATCHLIST_LISTINGS)
                        .bind(user_id)
                        .fetch_all(&mut **tx)
                        .await?,
                )
            })
        })
        .await
}

/// 모든 카테고리 조회 (원본 동작대로 로그인 필요)
pub async fn list_categories(
    db_manager: &DatabaseManager,
    caller: Option<i64>,
) -> Result<Vec<Category>, AppError> {
    caller.ok_or(AppError::Unauthorized)?;
    info!("{:<12} --> 카테고리 목록 조회", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                Ok(sqlx::query_as::<_, Category>(queries::GET_ALL_CATEGORIES)
                    .fetch_all(&mut **tx)
                    .await?)
            })
        })
        .await
}

/// 리스팅 조회
pub async fn get_listing(
    db_manager: &DatabaseManager,
    listing_id: i64,
) -> Result<Listing, AppError> {
    info!("{:<12} --> 리스팅 조회 id: {}", "Query", listing_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Listing>(queries::GET_LISTING)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("listing"))
            })
        })
        .await
}

/// 리스팅 상세 뷰 모델 조립
/// 리스팅, 댓글, 현재 입찰을 하나의 트랜잭션 스냅샷으로 읽고
/// 호출자가 있으면 관심 목록 포함 여부 / 종료 권한 / 낙찰 안내를 계산한다.
pub async fn listing_detail(
    db_manager: &DatabaseManager,
    listing_id: i64,
    caller: Option<i64>,
) -> Result<ListingDetailView, AppError> {
    info!(
        "{:<12} --> 리스팅 상세 조회 id: {}, caller: {:?}",
        "Query", listing_id, caller
    );
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let listing = sqlx::query_as::<_, Listing>(queries::GET_LISTING)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("listing"))?;

                let comments =
                    sqlx::query_as::<_, CommentView>(queries::GET_COMMENTS_FOR_LISTING)
                        .bind(listing_id)
                        .fetch_all(&mut **tx)
                        .await?;

                let current_bid = sqlx::query_as::<_, CurrentBid>(queries::GET_CURRENT_BID)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                let (in_watchlist, can_close, winner_announcement) = match caller {
                    Some(user_id) => {
                        let in_watchlist =
                            sqlx::query_scalar::<_, bool>(queries::IS_IN_WATCHLIST)
                                .bind(user_id)
                                .bind(listing_id)
                                .fetch_one(&mut **tx)
                                .await?;
                        let can_close = listing.owner_id == user_id;
                        let winner_announcement = if listing.is_closed {
                            Some(match &current_bid {
                                Some(bid) => format!(
                                    "This auction listing is won by {}",
                                    bid.bidder_display_name()
                                ),
                                None => "Nobody bid this auction.".to_string(),
                            })
                        } else {
                            None
                        };
                        (in_watchlist, can_close, winner_announcement)
                    }
                    None => (false, false, None),
                };

                Ok(ListingDetailView {
                    listing,
                    comments,
                    current_bid,
                    in_watchlist,
                    can_close,
                    winner_announcement,
                    error: None,
                    comment_form: CommentForm::default(),
                    bid_form: BidForm::default(),
                })
            })
        })
        .await
}

// endregion: --- Query Handlers
