use std::fs;
use std::path::Path;

use axum::http::HeaderMap;
use chrono::Local;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::core::errors::ApiError;
use crate::users::{Role, UserRecord, UserTable};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_TOKEN_HEADER: &str = "x-user-token";

type HmacSha256 = Hmac<Sha256>;

/// Shared secret that invite tokens are derived from.
#[derive(Clone)]
pub struct InviteSecret {
    key: Vec<u8>,
    created: Option<String>,
}

impl std::fmt::Debug for InviteSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteSecret")
            .field("key", &"****")
            .field("created", &self.created)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretFile {
    secret_key: String,
    #[serde(default)]
    created: Option<String>,
}

impl InviteSecret {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            created: None,
        }
    }

    pub fn created(&self) -> Option<&str> {
        self.created.as_deref()
    }

    pub fn load(path: &Path) -> Result<Self, ApiError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ApiError::Internal(format!(
                "Failed to read secret key {}: {}",
                path.display(),
                err
            ))
        })?;
        let file: SecretFile = serde_json::from_str(&contents).map_err(ApiError::internal)?;
        if file.secret_key.is_empty() {
            return Err(ApiError::Internal(format!(
                "Secret key in {} is empty",
                path.display()
            )));
        }
        Ok(Self {
            key: file.secret_key.into_bytes(),
            created: file.created,
        })
    }

    /// Loads the secret at `path`, creating a fresh one tagged with today's
    /// date when the file does not exist. The flag reports whether it was created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool), ApiError> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }

        let key = Uuid::new_v4().simple().to_string();
        let created = Local::now().format("%Y-%m-%d").to_string();
        let file = SecretFile {
            secret_key: key.clone(),
            created: Some(created.clone()),
        };

        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let payload = serde_json::to_string_pretty(&file).map_err(ApiError::internal)?;
        fs::write(path, payload).map_err(ApiError::internal)?;
        restrict_permissions(path);
        tracing::info!("Secret key created with tag: {}", created);

        Ok((
            Self {
                key: key.into_bytes(),
                created: Some(created),
            },
            true,
        ))
    }

    /// Hex HMAC-SHA256 of the identifier under this secret.
    pub fn derive_token(&self, user_id: &str) -> Result<String, ApiError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(ApiError::internal)?;
        mac.update(user_id.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            let _ = fs::set_permissions(path, perms);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Equality over SHA-256 digests of both values, so the comparison touches
/// 32 bytes no matter how long the presented token is.
pub fn tokens_match(expected: &str, presented: &str) -> bool {
    let expected_digest = Sha256::digest(expected.as_bytes());
    let presented_digest = Sha256::digest(presented.as_bytes());
    expected_digest
        .as_slice()
        .ct_eq(presented_digest.as_slice())
        .into()
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: String,
    pub token: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }
}

pub fn credentials_from_headers(headers: &HeaderMap) -> Credentials {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };
    Credentials {
        user_id: read(USER_ID_HEADER),
        token: read(USER_TOKEN_HEADER),
    }
}

/// Checks identifier, token and activation, in that order.
pub fn validate_credentials(
    table: &UserTable,
    secret: &InviteSecret,
    credentials: &Credentials,
) -> Result<UserRecord, ApiError> {
    let record = table
        .get(&credentials.user_id)
        .ok_or(ApiError::UnknownUser)?;

    let expected = secret.derive_token(&credentials.user_id)?;
    if !tokens_match(&expected, &credentials.token) {
        return Err(ApiError::InvalidToken);
    }

    if record.role == Role::User && !record.active {
        return Err(ApiError::AccountDeactivated);
    }

    Ok(record.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn secret() -> InviteSecret {
        InviteSecret::new("0123456789abcdef0123456789abcdef")
    }

    fn table_with(user_id: &str, role: Role, active: bool) -> UserTable {
        let mut table = UserTable::default();
        let token = secret().derive_token(user_id).unwrap();
        let mut record = UserRecord::new(token, role, 128_000);
        record.active = active;
        table.insert(user_id.to_string(), record);
        table
    }

    #[test]
    fn derive_token_is_deterministic_hex_sha256() {
        let first = secret().derive_token("happy-otter-204").unwrap();
        let second = secret().derive_token("happy-otter-204").unwrap();
        let other = secret().derive_token("brave-fox-512").unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn derive_token_matches_rfc4231_vector() {
        // RFC 4231 test case 2.
        let secret = InviteSecret::new("Jefe");
        assert_eq!(
            secret.derive_token("what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn tokens_match_handles_any_length() {
        assert!(tokens_match("abc", "abc"));
        assert!(!tokens_match("abc", "abd"));
        assert!(!tokens_match("abc", ""));
        assert!(!tokens_match("abc", &"a".repeat(10_000)));
    }

    #[test]
    fn validate_accepts_correct_token() {
        let table = table_with("happy-otter-204", Role::User, true);
        let token = secret().derive_token("happy-otter-204").unwrap();

        let record =
            validate_credentials(&table, &secret(), &Credentials::new("happy-otter-204", token))
                .unwrap();

        assert_eq!(record.role, Role::User);
    }

    #[test]
    fn validate_rejects_unknown_user() {
        let table = table_with("happy-otter-204", Role::User, true);
        let result =
            validate_credentials(&table, &secret(), &Credentials::new("ghost-alien-999", "x"));
        assert!(matches!(result, Err(ApiError::UnknownUser)));
    }

    #[test]
    fn validate_rejects_wrong_tokens_of_any_shape() {
        let table = table_with("happy-otter-204", Role::User, true);
        let correct = secret().derive_token("happy-otter-204").unwrap();
        let mut same_length = correct.clone();
        same_length.replace_range(0..1, if correct.starts_with('0') { "1" } else { "0" });

        for wrong in ["", "short", same_length.as_str(), &correct.to_uppercase()] {
            let result = validate_credentials(
                &table,
                &secret(),
                &Credentials::new("happy-otter-204", wrong),
            );
            assert!(matches!(result, Err(ApiError::InvalidToken)), "{wrong}");
        }
    }

    #[test]
    fn deactivated_user_is_rejected_but_admin_flag_is_ignored() {
        let token = secret().derive_token("brave-fox-512").unwrap();
        let table = table_with("brave-fox-512", Role::User, false);
        let result = validate_credentials(
            &table,
            &secret(),
            &Credentials::new("brave-fox-512", token.clone()),
        );
        assert!(matches!(result, Err(ApiError::AccountDeactivated)));

        let table = table_with("brave-fox-512", Role::Admin, false);
        let result =
            validate_credentials(&table, &secret(), &Credentials::new("brave-fox-512", token));
        assert!(result.is_ok());
    }

    #[test]
    fn credentials_from_headers_reads_and_trims() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" happy-otter-204 "));
        headers.insert(USER_TOKEN_HEADER, HeaderValue::from_static("abc"));

        let creds = credentials_from_headers(&headers);

        assert_eq!(creds.user_id, "happy-otter-204");
        assert_eq!(creds.token, "abc");
    }

    #[test]
    fn credentials_from_headers_tolerates_missing_or_non_utf8() {
        let mut headers = HeaderMap::new();
        let non_utf8 = HeaderValue::from_bytes(&[0xFF, 0xFE, 0xFD])
            .expect("header value bytes should be accepted");
        headers.insert(USER_TOKEN_HEADER, non_utf8);

        let creds = credentials_from_headers(&headers);

        assert_eq!(creds.user_id, "");
        assert_eq!(creds.token, "");
    }

    #[test]
    fn load_or_create_persists_secret_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret-key.json");

        let (created, was_created) = InviteSecret::load_or_create(&path).unwrap();
        let (loaded, was_created_again) = InviteSecret::load_or_create(&path).unwrap();

        assert!(was_created);
        assert!(!was_created_again);
        assert!(created.created().is_some());
        assert_eq!(
            created.derive_token("calm-panda-101").unwrap(),
            loaded.derive_token("calm-panda-101").unwrap()
        );
    }
}
