/// 인증 서브시스템
/// 1. 자격 증명 (bcrypt 해시 저장/검증)
/// 2. 세션 쿠키 (tower-sessions 래퍼)
// region:    --- Imports
use crate::database::DatabaseManager;
use crate::error::{AppError, FieldError};
use crate::listing::model::User;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;
use tracing::info;

// endregion: --- Imports

// region:    --- SQL

const INSERT_USER: &str = r#"
    INSERT INTO users (username, email, password_hash, first_name, last_name)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING id, username, email, password_hash, first_name, last_name, created_at
"#;

const GET_USER_BY_USERNAME: &str = r#"
    SELECT id, username, email, password_hash, first_name, last_name, created_at
    FROM users
    WHERE username = $1
"#;

// endregion: --- SQL

// region:    --- Forms

/// 회원 가입 폼
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirmation: String,
    pub first_name: String,
    pub last_name: String,
}

/// 로그인 폼
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// 회원 가입 폼 검증
pub fn validate_register_form(form: &RegisterForm) -> Result<(), AppError> {
    let mut errors = Vec::new();

    if form.username.trim().is_empty() {
        errors.push(FieldError::new("username", "This field is required."));
    }
    if form.email.trim().is_empty() {
        errors.push(FieldError::new("email", "This field is required."));
    }
    if form.password.is_empty() {
        errors.push(FieldError::new("password", "This field is required."));
    } else if form.password != form.confirmation {
        errors.push(FieldError::new("confirmation", "Passwords must match."));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

// endregion: --- Forms

// region:    --- Password Hashing

/// bcrypt로 비밀번호 해시
pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// 저장된 해시에 대한 비밀번호 검증
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    Ok(bcrypt::verify(password, password_hash)?)
}

// endregion: --- Password Hashing

// region:    --- Session

/// 세션 키
const SESSION_USER_ID: &str = "auth:user";

/// 인증 세션 래퍼
/// 세션 키를 한 곳에 모아 오타를 방지하는 타입 인터페이스.
pub struct AuthSession<'a> {
    session: &'a Session,
}

impl<'a> AuthSession<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// 로그인된 사용자 id 조회 (비로그인 시 None)
    pub async fn user_id(&self) -> Result<Option<i64>, AppError> {
        Ok(self.session.get::<i64>(SESSION_USER_ID).await?)
    }

    /// 로그인 상태 저장
    pub async fn set_user_id(&self, user_id: i64) -> Result<(), AppError> {
        self.session.insert(SESSION_USER_ID, user_id).await?;
        Ok(())
    }

    /// 세션 비우기 (로그아웃)
    pub async fn clear(&self) {
        self.session.clear().await;
    }
}

// endregion: --- Session

// region:    --- Authenticator

/// 자격 증명 등록/검증 트레이트
#[async_trait]
pub trait Authenticator {
    async fn register(&self, form: RegisterForm) -> Result<User, AppError>;
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError>;
}

/// Postgres + bcrypt 구현체
pub struct PostgresAuthenticator {
    db_manager: Arc<DatabaseManager>,
}

impl PostgresAuthenticator {
    pub fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }
}

#[async_trait]
impl Authenticator for PostgresAuthenticator {
    /// 회원 가입: 검증 후 해시를 저장한다.
    /// username 중복은 사전 조회가 아니라 유니크 제약 위반으로 감지한다.
    async fn register(&self, form: RegisterForm) -> Result<User, AppError> {
        info!("{:<12} --> 회원 가입 요청: {}", "Auth", form.username);
        validate_register_form(&form)?;

        let username = form.username.trim().to_string();
        let email = form.email.trim().to_string();
        let first_name = form.first_name.trim().to_string();
        let last_name = form.last_name.trim().to_string();
        let password_hash = hash_password(&form.password)?;

        self.db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    let inserted = sqlx::query_as::<_, User>(INSERT_USER)
                        .bind(&username)
                        .bind(&email)
                        .bind(&password_hash)
                        .bind(&first_name)
                        .bind(&last_name)
                        .fetch_one(&mut **tx)
                        .await;

                    match inserted {
                        Ok(user) => Ok(user),
                        Err(e) if is_unique_violation(&e) => {
                            Err(AppError::Conflict("Username already taken.".to_string()))
                        }
                        Err(e) => Err(AppError::Database(e)),
                    }
                })
            })
            .await
    }

    /// 로그인: 사용자 조회 후 해시 검증
    /// 계정 부재와 비밀번호 불일치를 구분하지 않는다.
    async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        info!("{:<12} --> 로그인 요청: {}", "Auth", username);
        let username = username.trim().to_string();

        let user = self
            .db_manager
            .transaction(|tx| {
                Box::pin(async move {
                    Ok::<_, AppError>(
                        sqlx::query_as::<_, User>(GET_USER_BY_USERNAME)
                            .bind(&username)
                            .fetch_optional(&mut **tx)
                            .await?,
                    )
                })
            })
            .await?;

        let user = user.ok_or(AppError::Unauthorized)?;
        if verify_password(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

/// 유니크 제약 위반 여부
fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// endregion: --- Authenticator

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_form_requires_matching_passwords() {
        let form = RegisterForm {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
            confirmation: "different".to_string(),
            ..RegisterForm::default()
        };
        let err = validate_register_form(&form).unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "confirmation");
                assert_eq!(errors[0].message, "Passwords must match.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn register_form_reports_missing_fields() {
        let err = validate_register_form(&RegisterForm::default()).unwrap_err();
        match err {
            AppError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["username", "email", "password"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        // 테스트에서는 낮은 cost로 충분하다
        let hash = bcrypt::hash("secret", 4).unwrap();
        assert!(bcrypt::verify("secret", &hash).unwrap());
        assert!(!bcrypt::verify("wrong", &hash).unwrap());
    }
}

// endregion: --- Tests
