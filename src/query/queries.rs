/// 진행 중인 리스팅 목록 조회 (홈 화면)
pub const LIST_ACTIVE_LISTINGS: &str = r#"
    SELECT id, title, description, starting_price, current_price, image_url, is_closed, category_id, owner_id, created_at
    FROM listings
    WHERE is_closed = FALSE
"#;

/// 카테고리별 리스팅 조회 (종료 여부 무관)
pub const LIST_LISTINGS_BY_CATEGORY: &str = r#"
    SELECT id, title, description, starting_price, current_price, image_url, is_closed, category_id, owner_id, created_at
    FROM listings
    WHERE category_id = $1
"#;

/// 사용자 관심 목록 리스팅 조회
pub const LIST_WATCHLIST_LISTINGS: &str = r#"
    SELECT l.id, l.title, l.description, l.starting_price, l.current_price, l.image_url, l.is_closed, l.category_id, l.owner_id, l.created_at
    FROM listings l
    JOIN watchlist w ON w.listing_id = l.id
    WHERE w.user_id = $1
"#;

/// 리스팅 조회
pub const GET_LISTING: &str = r#"
    SELECT id, title, description, starting_price, current_price, image_url, is_closed, category_id, owner_id, created_at
    FROM listings
    WHERE id = $1
"#;

/// 모든 카테고리 조회
pub const GET_ALL_CATEGORIES: &str = "SELECT id, name FROM categories";

/// 카테고리 조회
pub const GET_CATEGORY: &str = "SELECT id, name FROM categories WHERE id = $1";

/// 리스팅 댓글 조회 (작성자 이름 포함, 작성 순서 고정)
pub const GET_COMMENTS_FOR_LISTING: &str = r#"
    SELECT c.id, c.body, u.username AS author, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
    WHERE c.listing_id = $1
    ORDER BY c.id
"#;

/// 현재(최고) 입찰 조회
/// 수락 규칙이 가격 단조 증가를 보장하므로 최신 입찰이 곧 최고 입찰이다.
pub const GET_CURRENT_BID: &str = r#"
    SELECT b.price, b.bidder_id, u.username AS bidder_username, u.first_name AS bidder_first_name, u.last_name AS bidder_last_name
    FROM bids b
    JOIN users u ON u.id = b.bidder_id
    WHERE b.listing_id = $1
    ORDER BY b.id DESC
    LIMIT 1
"#;

/// 관심 목록 포함 여부 조회
pub const IS_IN_WATCHLIST: &str =
    "SELECT EXISTS (SELECT 1 FROM watchlist WHERE user_id = $1 AND listing_id = $2)";
