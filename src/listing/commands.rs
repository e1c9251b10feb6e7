/// 리스팅 도메인 커맨드 처리
/// 1. 리스팅 생성 (임시 카테고리 생성 포함)
/// 2. 입찰
/// 3. 댓글 작성
/// 4. 경매 종료
/// 5. 관심 목록 토글
// region:    --- Imports
use crate::database::DatabaseManager;
use crate::error::{AppError, FieldError};
use crate::listing::model::Listing;
use serde::{Deserialize, Serialize};
use tracing::info;
// endregion: --- Imports

// region:    --- Messages

/// 입찰 거절 메시지 (시작가 미만이거나 기존 최고가 이하)
pub const BID_REJECTED_MESSAGE: &str =
    "Bid must be as large as starting bid, and must be greater than any other bids that have been placed.";

/// 종료된 경매에 대한 입찰 거절 메시지
pub const LISTING_CLOSED_MESSAGE: &str = "This auction is closed and no longer accepts bids.";

// endregion: --- Messages

// region:    --- SQL

const INSERT_CATEGORY: &str = "INSERT INTO categories (name) VALUES ($1) RETURNING id";

const GET_CATEGORY_ID: &str = "SELECT id FROM categories WHERE id = $1";

const INSERT_LISTING: &str = r#"
    INSERT INTO listings (title, description, starting_price, image_url, category_id, owner_id)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING id
"#;

const GET_LISTING: &str = r#"
    SELECT id, title, description, starting_price, current_price, image_url, is_closed, category_id, owner_id, created_at
    FROM listings
    WHERE id = $1
"#;

/// 조건부 최고가 갱신: 수락 조건을 만족하는 경우에만 행이 갱신된다.
/// 동시 입찰 경합에서는 한 쪽만 조건을 통과한다.
const UPDATE_CURRENT_PRICE: &str = r#"
    UPDATE listings SET current_price = $1
    WHERE id = $2
      AND is_closed = FALSE
      AND ((current_price IS NULL AND $1 >= starting_price) OR current_price < $1)
    RETURNING id
"#;

const INSERT_BID: &str =
    "INSERT INTO bids (listing_id, bidder_id, price) VALUES ($1, $2, $3)";

const INSERT_COMMENT: &str =
    "INSERT INTO comments (listing_id, author_id, body) VALUES ($1, $2, $3)";

const GET_LISTING_OWNER: &str = "SELECT owner_id FROM listings WHERE id = $1";

const CLOSE_LISTING: &str = "UPDATE listings SET is_closed = TRUE WHERE id = $1";

const ADD_WATCH: &str = r#"
    INSERT INTO watchlist (user_id, listing_id)
    VALUES ($1, $2)
    ON CONFLICT (user_id, listing_id) DO NOTHING
"#;

const REMOVE_WATCH: &str = "DELETE FROM watchlist WHERE user_id = $1 AND listing_id = $2";

// endregion: --- SQL

// region:    --- Forms

/// 리스팅 생성 폼
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ListingForm {
    pub title: String,
    pub description: String,
    pub starting_price: String,
    pub image_url: String,
    pub category: String,
    pub new_category: String,
}

/// 입찰 폼
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BidForm {
    pub price: String,
}

/// 댓글 폼
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CommentForm {
    pub text: String,
}

/// 관심 목록 토글 폼
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WatchlistForm {
    pub action: String,
}

/// 관심 목록 토글 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchlistAction {
    Add,
    Remove,
}

impl WatchlistAction {
    /// 폼 값 파싱 ("add" | "remove")
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim() {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            _ => Err(AppError::validation(
                "action",
                "Watchlist action must be \"add\" or \"remove\".",
            )),
        }
    }
}

// endregion: --- Forms

// region:    --- Validation

/// 검증을 통과한 리스팅 입력
#[derive(Debug, Clone)]
pub struct ValidListing {
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    pub image_url: Option<String>,
}

/// 리스팅 폼 검증: 필수 필드와 시작가 타입 확인
pub fn validate_listing_form(form: &ListingForm) -> Result<ValidListing, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = form.title.trim();
    if title.is_empty() {
        errors.push(FieldError::new("title", "This field is required."));
    }

    let description = form.description.trim();
    if description.is_empty() {
        errors.push(FieldError::new("description", "This field is required."));
    }

    let starting_price = match form.starting_price.trim().parse::<i64>() {
        Ok(price) if price >= 0 => Some(price),
        _ => {
            errors.push(FieldError::new(
                "starting_price",
                "Starting price must be a non-negative whole number.",
            ));
            None
        }
    };

    let image_url = form.image_url.trim();
    let image_url = if image_url.is_empty() {
        None
    } else {
        Some(image_url.to_string())
    };

    match (errors.is_empty(), starting_price) {
        (true, Some(starting_price)) => Ok(ValidListing {
            title: title.to_string(),
            description: description.to_string(),
            starting_price,
            image_url,
        }),
        _ => Err(errors),
    }
}

/// 입찰 폼 수준 검증: 양의 정수만 허용
pub fn parse_bid_price(raw: &str) -> Option<i64> {
    match raw.trim().parse::<i64>() {
        Ok(price) if price > 0 => Some(price),
        _ => None,
    }
}

/// 입찰 수락 규칙: 시작가 이상이어야 하고,
/// 수락된 기존 입찰이 있으면 그 가격을 엄격히 초과해야 한다.
pub fn bid_meets_minimum(starting_price: i64, current_price: Option<i64>, offered: i64) -> bool {
    offered >= starting_price && current_price.map_or(true, |current| offered > current)
}

// endregion: --- Validation

// region:    --- Commands

/// 1. 리스팅 생성
/// 카테고리 결정과 리스팅 저장은 하나의 트랜잭션으로 처리한다.
pub async fn handle_create_listing(
    form: ListingForm,
    caller: Option<i64>,
    db_manager: &DatabaseManager,
) -> Result<i64, AppError> {
    let owner_id = caller.ok_or(AppError::Unauthorized)?;
    info!(
        "{:<12} --> 리스팅 생성 요청 처리 시작: owner={}",
        "Command", owner_id
    );

    let valid = validate_listing_form(&form).map_err(AppError::Validation)?;
    let category_choice = form.category.trim().to_string();
    let new_category = form.new_category.trim().to_string();

    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                // 카테고리 결정: 새 이름이 주어지면 드롭다운 선택을 무시하고
                // 항상 새 카테고리를 생성한다 (이름 중복 허용).
                let category_id = if !new_category.is_empty() {
                    sqlx::query_scalar::<_, i64>(INSERT_CATEGORY)
                        .bind(&new_category)
                        .fetch_one(&mut **tx)
                        .await?
                } else {
                    let chosen: i64 = category_choice.parse().map_err(|_| {
                        AppError::validation("category", "Select a valid category.")
                    })?;
                    sqlx::query_scalar::<_, i64>(GET_CATEGORY_ID)
                        .bind(chosen)
                        .fetch_optional(&mut **tx)
                        .await?
                        .ok_or(AppError::NotFound("category"))?
                };

                let listing_id = sqlx::query_scalar::<_, i64>(INSERT_LISTING)
                    .bind(&valid.title)
                    .bind(&valid.description)
                    .bind(valid.starting_price)
                    .bind(&valid.image_url)
                    .bind(category_id)
                    .bind(owner_id)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(listing_id)
            })
        })
        .await
}

/// 2. 입찰
/// 조회-검증-갱신-저장 전체가 하나의 트랜잭션이다. 두 입찰자가 동시에
/// 도착하는 경합은 조건부 UPDATE가 한 쪽만 수락한다 (나머지는 거절 메시지).
pub async fn handle_place_bid(
    listing_id: i64,
    form: BidForm,
    caller: Option<i64>,
    db_manager: &DatabaseManager,
) -> Result<(), AppError> {
    let bidder_id = caller.ok_or(AppError::Unauthorized)?;
    info!(
        "{:<12} --> 입찰 요청 처리 시작: listing={}, bidder={}",
        "Command", listing_id, bidder_id
    );

    let price = parse_bid_price(&form.price)
        .ok_or_else(|| AppError::validation("price", "Enter a positive whole number."))?;

    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let listing = sqlx::query_as::<_, Listing>(GET_LISTING)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("listing"))?;

                if listing.is_closed {
                    return Err(AppError::validation("price", LISTING_CLOSED_MESSAGE));
                }
                if !bid_meets_minimum(listing.starting_price, listing.current_price, price) {
                    return Err(AppError::validation("price", BID_REJECTED_MESSAGE));
                }

                let updated = sqlx::query_scalar::<_, i64>(UPDATE_CURRENT_PRICE)
                    .bind(price)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                if updated.is_none() {
                    // 같은 순간 더 높은 입찰이 먼저 수락된 경우
                    return Err(AppError::validation("price", BID_REJECTED_MESSAGE));
                }

                sqlx::query(INSERT_BID)
                    .bind(listing_id)
                    .bind(bidder_id)
                    .bind(price)
                    .execute(&mut **tx)
                    .await?;

                Ok(())
            })
        })
        .await
}

/// 3. 댓글 작성
pub async fn handle_add_comment(
    listing_id: i64,
    form: CommentForm,
    caller: Option<i64>,
    db_manager: &DatabaseManager,
) -> Result<(), AppError> {
    let author_id = caller.ok_or(AppError::Unauthorized)?;
    info!(
        "{:<12} --> 댓글 작성 요청 처리 시작: listing={}, author={}",
        "Command", listing_id, author_id
    );

    let body = form.text.trim().to_string();
    if body.is_empty() {
        return Err(AppError::validation("text", "This field is required."));
    }

    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar::<_, i64>(GET_LISTING_OWNER)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("listing"))?;

                sqlx::query(INSERT_COMMENT)
                    .bind(listing_id)
                    .bind(author_id)
                    .bind(&body)
                    .execute(&mut **tx)
                    .await?;

                Ok(())
            })
        })
        .await
}

/// 4. 경매 종료
/// 소유자만 종료할 수 있다. 이미 종료된 리스팅을 다시 종료해도
/// 오류 없이 종료 상태가 유지된다 (단방향 전이).
pub async fn handle_close_listing(
    listing_id: i64,
    caller: Option<i64>,
    db_manager: &DatabaseManager,
) -> Result<(), AppError> {
    let caller_id = caller.ok_or(AppError::Unauthorized)?;
    info!(
        "{:<12} --> 경매 종료 요청 처리 시작: listing={}, caller={}",
        "Command", listing_id, caller_id
    );

    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let owner_id = sqlx::query_scalar::<_, i64>(GET_LISTING_OWNER)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("listing"))?;

                if owner_id != caller_id {
                    return Err(AppError::Unauthorized);
                }

                sqlx::query(CLOSE_LISTING)
                    .bind(listing_id)
                    .execute(&mut **tx)
                    .await?;

                Ok(())
            })
        })
        .await
}

/// 5. 관심 목록 토글 (양방향 모두 멱등)
pub async fn handle_toggle_watchlist(
    listing_id: i64,
    action: WatchlistAction,
    caller: Option<i64>,
    db_manager: &DatabaseManager,
) -> Result<(), AppError> {
    let user_id = caller.ok_or(AppError::Unauthorized)?;
    info!(
        "{:<12} --> 관심 목록 토글: listing={}, user={}, action={:?}",
        "Command", listing_id, user_id, action
    );

    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_scalar::<_, i64>(GET_LISTING_OWNER)
                    .bind(listing_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or(AppError::NotFound("listing"))?;

                match action {
                    WatchlistAction::Add => {
                        sqlx::query(ADD_WATCH)
                            .bind(user_id)
                            .bind(listing_id)
                            .execute(&mut **tx)
                            .await?;
                    }
                    WatchlistAction::Remove => {
                        sqlx::query(REMOVE_WATCH)
                            .bind(user_id)
                            .bind(listing_id)
                            .execute(&mut **tx)
                            .await?;
                    }
                }

                Ok(())
            })
        })
        .await
}

// endregion: --- Commands

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bid_rule_without_prior_bid() {
        // 시작가 100: 99는 거절, 100은 수락
        assert!(!bid_meets_minimum(100, None, 99));
        assert!(bid_meets_minimum(100, None, 100));
        assert!(bid_meets_minimum(100, None, 101));
    }

    #[test]
    fn bid_rule_with_prior_bid() {
        // 기존 최고가 150: 동액은 거절, 151부터 수락
        assert!(!bid_meets_minimum(100, Some(150), 150));
        assert!(bid_meets_minimum(100, Some(150), 151));
        assert!(!bid_meets_minimum(100, Some(150), 99));
    }

    #[test]
    fn bid_price_must_be_positive_integer() {
        assert_eq!(parse_bid_price("120"), Some(120));
        assert_eq!(parse_bid_price("  7 "), Some(7));
        assert_eq!(parse_bid_price("0"), None);
        assert_eq!(parse_bid_price("-5"), None);
        assert_eq!(parse_bid_price("12.5"), None);
        assert_eq!(parse_bid_price("abc"), None);
        assert_eq!(parse_bid_price(""), None);
    }

    #[test]
    fn listing_form_reports_all_missing_fields() {
        let form = ListingForm {
            starting_price: "ten".to_string(),
            ..ListingForm::default()
        };
        let errors = validate_listing_form(&form).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["title", "description", "starting_price"]);
    }

    #[test]
    fn listing_form_accepts_valid_input() {
        let form = ListingForm {
            title: "  Vintage clock  ".to_string(),
            description: "Working condition".to_string(),
            starting_price: "50".to_string(),
            image_url: "   ".to_string(),
            ..ListingForm::default()
        };
        let valid = validate_listing_form(&form).expect("form should validate");
        assert_eq!(valid.title, "Vintage clock");
        assert_eq!(valid.starting_price, 50);
        assert_eq!(valid.image_url, None);
    }

    #[test]
    fn watchlist_action_parses_known_values_only() {
        assert_eq!(WatchlistAction::parse("add").unwrap(), WatchlistAction::Add);
        assert_eq!(
            WatchlistAction::parse(" remove ").unwrap(),
            WatchlistAction::Remove
        );
        assert!(WatchlistAction::parse("toggle").is_err());
    }
}

// endregion: --- Tests
