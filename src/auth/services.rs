use anyhow::Context;
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use tracing::{error, info, warn};

use crate::auth::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::auth::password::PasswordError;
use crate::auth::repo_types::{NewUser, PublicUser, User};
use crate::error::{AppError, StoreError};
use crate::state::AppState;
use crate::uploads::{discard_picture, stage_picture, UploadItem};

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_NAME_LEN: usize = 50;
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_EMAIL_LEN: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_name(field: &str, value: &str) -> Result<(), AppError> {
    let len = value.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(AppError::validation(format!(
            "{field} must be between {MIN_NAME_LEN} and {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Field checks for registration. Normalizes the email in place.
pub fn validate_registration(req: &mut RegisterRequest) -> Result<(), AppError> {
    req.first_name = req.first_name.trim().to_string();
    req.last_name = req.last_name.trim().to_string();
    req.email = normalize_email(&req.email);

    check_name("firstName", &req.first_name)?;
    check_name("lastName", &req.last_name)?;
    if req.email.len() > MAX_EMAIL_LEN || !is_valid_email(&req.email) {
        return Err(AppError::validation("Invalid email"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password too short"));
    }
    Ok(())
}

async fn hash_blocking(state: &AppState, password: String) -> Result<String, AppError> {
    let hasher = state.hasher.clone();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("hash task panicked")?
        .context("hash password")?;
    Ok(hash)
}

async fn verify_blocking(
    state: &AppState,
    password: String,
    hash: Option<String>,
) -> Result<Result<bool, PasswordError>, AppError> {
    let hasher = state.hasher.clone();
    let outcome = tokio::task::spawn_blocking(move || match hash {
        Some(hash) => hasher.verify(&password, &hash),
        None => {
            hasher.verify_dummy(&password);
            Ok(false)
        }
    })
    .await
    .context("verify task panicked")?;
    Ok(outcome)
}

/// Validates, stores the optional picture, hashes and persists a new user.
pub async fn register_user(
    state: &AppState,
    mut req: RegisterRequest,
    picture: Option<UploadItem>,
) -> Result<User, AppError> {
    validate_registration(&mut req)?;

    let picture = match picture {
        Some(item) => Some(stage_picture(state, "users", item).await?),
        None => None,
    };

    let password_hash = hash_blocking(state, std::mem::take(&mut req.password)).await?;

    let (viewed_profile, impressions) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(0..10_000), rng.gen_range(0..10_000))
    };
    let new_user = NewUser {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        password_hash,
        picture_path: picture.as_ref().map(|p| p.key().to_string()),
        location: req.location,
        occupation: req.occupation,
        viewed_profile,
        impressions,
    };

    let user = match state.users.create(new_user).await {
        Ok(user) => user,
        Err(StoreError::Conflict) => {
            warn!("email already registered");
            discard_picture(picture).await;
            return Err(AppError::Conflict("Email already registered".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            discard_picture(picture).await;
            return Err(e.into());
        }
    };
    if let Some(p) = picture {
        p.commit();
    }

    info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Checks credentials and issues a token.
///
/// Unknown email, wrong password and an unreadable stored hash all end in the
/// same `InvalidCredentials` so callers can't probe which emails exist.
pub async fn login_user(state: &AppState, req: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("email and password are required"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Invalid email"));
    }

    let user = state.users.find_by_email(&email).await.map_err(|e| {
        error!(error = %e, "find_by_email failed");
        AppError::from(e)
    })?;

    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_blocking(state, req.password, stored_hash).await?;

    let user = match (user, verified) {
        (Some(user), Ok(true)) => user,
        (Some(user), Ok(false)) => {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }
        (Some(user), Err(e)) => {
            error!(user_id = %user.id, error = %e, "stored password hash is corrupt");
            return Err(AppError::InvalidCredentials);
        }
        (None, _) => {
            warn!("login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = state.keys.issue(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::Internal(e)
    })?;

    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        token,
        user: PublicUser::from(user),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password: password.into(),
            location: Some("London".into()),
            occupation: Some("Mathematician".into()),
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn registration_validation_rules() {
        let mut ok = request("  A@X.com ", "secret");
        validate_registration(&mut ok).unwrap();
        assert_eq!(ok.email, "a@x.com");

        let mut short_pw = request("a@x.com", "abc");
        assert!(matches!(validate_registration(&mut short_pw), Err(AppError::Validation(_))));

        let mut short_name = request("a@x.com", "secret");
        short_name.first_name = "A".into();
        assert!(matches!(validate_registration(&mut short_name), Err(AppError::Validation(_))));

        let mut long_email = request(&format!("{}@x.com", "a".repeat(60)), "secret");
        assert!(matches!(validate_registration(&mut long_email), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn register_stores_hash_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let user = register_user(&state, request("a@x.com", "secret"), None).await.unwrap();
        assert_ne!(user.password_hash, "secret");
        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(user.picture_path.is_none());
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        register_user(&state, request("a@x.com", "secret"), None).await.unwrap();
        let err = register_user(&state, request("A@X.COM", "other-secret"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_registration_exactly_one_wins() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let (a, b) = tokio::join!(
            register_user(&state, request("race@x.com", "secret"), None),
            register_user(&state, request("race@x.com", "secret"), None),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(AppError::Conflict(_))))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn conflicting_registration_removes_its_picture() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        register_user(&state, request("a@x.com", "secret"), None).await.unwrap();

        let picture = UploadItem {
            body: bytes::Bytes::from_static(b"img"),
            content_type: "image/png".into(),
            ext: "png",
        };
        let err = register_user(&state, request("a@x.com", "secret"), Some(picture))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let users_dir = dir.path().join("assets").join("users");
        let remaining = std::fs::read_dir(&users_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn login_issues_token_for_the_user() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let user = register_user(&state, request("a@x.com", "secret"), None).await.unwrap();

        let resp = login_user(&state, login("A@x.com ", "secret")).await.unwrap();
        assert_eq!(resp.user.id, user.id);
        let claims = state.keys.verify(&resp.token).unwrap();
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        register_user(&state, request("a@x.com", "secret"), None).await.unwrap();

        let wrong = login_user(&state, login("a@x.com", "nope!")).await.unwrap_err();
        let unknown = login_user(&state, login("b@x.com", "secret")).await.unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn corrupt_stored_hash_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        state
            .users
            .create(NewUser {
                first_name: "Bad".into(),
                last_name: "Hash".into(),
                email: "bad@x.com".into(),
                password_hash: "not-a-phc-string".into(),
                picture_path: None,
                location: None,
                occupation: None,
                viewed_profile: 0,
                impressions: 0,
            })
            .await
            .unwrap();
        let err = login_user(&state, login("bad@x.com", "whatever")).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn empty_login_fields_are_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let err = login_user(&state, login("", "")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
