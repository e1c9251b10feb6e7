use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::listing::commands::{BidForm, CommentForm, ListingForm};

// 사용자 모델
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// 화면 표시용 이름 ("이름 성", 둘 다 비어 있으면 username)
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name, &self.username)
    }
}

/// 화면 표시용 이름 조합
pub fn display_name(first_name: &str, last_name: &str, username: &str) -> String {
    let full = format!("{} {}", first_name, last_name);
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

// 카테고리 모델 (이름 중복 허용)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

// 경매 리스팅 모델
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Listing {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    /// 수락된 최고 입찰가 (입찰이 없으면 None)
    pub current_price: Option<i64>,
    /// 외부 블롭 저장소를 가리키는 이미지 참조
    pub image_url: Option<String>,
    pub is_closed: bool,
    pub category_id: i64,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

// 현재(최고) 입찰 뷰
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CurrentBid {
    pub price: i64,
    pub bidder_id: i64,
    pub bidder_username: String,
    pub bidder_first_name: String,
    pub bidder_last_name: String,
}

impl CurrentBid {
    /// 입찰자 화면 표시용 이름
    pub fn bidder_display_name(&self) -> String {
        display_name(
            &self.bidder_first_name,
            &self.bidder_last_name,
            &self.bidder_username,
        )
    }
}

// 댓글 뷰 (작성자 이름 포함)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

// region:    --- View Models

/// 리스팅 상세 화면 뷰 모델
/// 렌더링 계층이 소비하는 번들: 리스팅, 댓글, 현재 입찰,
/// 호출자 조건부 플래그, 빈 입력 폼 2개
#[derive(Debug, Serialize)]
pub struct ListingDetailView {
    pub listing: Listing,
    pub comments: Vec<CommentView>,
    pub current_bid: Option<CurrentBid>,
    pub in_watchlist: bool,
    pub can_close: bool,
    pub winner_announcement: Option<String>,
    pub error: Option<String>,
    pub comment_form: CommentForm,
    pub bid_form: BidForm,
}

/// 리스팅 작성 화면 뷰 모델 (드롭다운용 카테고리 목록 포함)
#[derive(Debug, Serialize)]
pub struct CreateListingView {
    pub form: ListingForm,
    pub categories: Vec<Category>,
    pub errors: Vec<FieldError>,
}

/// 로그인 화면 뷰 모델
#[derive(Debug, Serialize)]
pub struct LoginView {
    pub username: String,
    pub message: Option<String>,
}

/// 회원 가입 화면 뷰 모델 (재렌더링 시 비밀번호는 보존하지 않는다)
#[derive(Debug, Serialize)]
pub struct RegisterView {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub message: Option<String>,
}

// endregion: --- View Models
