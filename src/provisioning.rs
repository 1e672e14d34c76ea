use std::collections::BTreeMap;

use chrono::Local;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::core::errors::ApiError;
use crate::core::security::InviteSecret;
use crate::users::{Role, UserRecord, UserTable};

pub const ADMIN_USER_ID: &str = "admin-ranger-001";

pub const ADJECTIVES: [&str; 16] = [
    "happy", "sneaky", "brave", "gentle", "proud", "quick", "smart", "calm", "mighty", "lazy",
    "wild", "eager", "tiny", "lucky", "bright", "cool",
];

pub const NOUNS: [&str; 16] = [
    "rider", "hawk", "pirate", "ninja", "panda", "wizard", "chef", "ranger", "robot", "fox",
    "lion", "whale", "sloth", "otter", "ghost", "alien",
];

const SUFFIX_RANGE: std::ops::RangeInclusive<u16> = 100..=999;

/// Number of distinct identifiers `generate_readable_id` can produce.
pub fn id_space() -> usize {
    ADJECTIVES.len() * NOUNS.len() * SUFFIX_RANGE.len()
}

/// `adjective-noun-NNN`, e.g. `happy-otter-204`.
pub fn generate_readable_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or(ADJECTIVES[0]);
    let noun = NOUNS.choose(rng).copied().unwrap_or(NOUNS[0]);
    let number = rng.random_range(SUFFIX_RANGE);
    format!("{}-{}-{}", adjective, noun, number)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub admin_created: bool,
    pub added: Vec<String>,
    pub created_date: String,
}

/// Ensures the admin account exists and adds `count` fresh user accounts
/// with a budget of `max_tokens`, skipping identifiers already in the table.
pub fn provision_users<R: Rng + ?Sized>(
    table: &mut UserTable,
    secret: &InviteSecret,
    count: usize,
    max_tokens: u64,
    rng: &mut R,
) -> Result<ProvisionReport, ApiError> {
    let free = id_space().saturating_sub(table.len());
    if count > free {
        return Err(ApiError::BadRequest(format!(
            "Cannot add {} users, only {} identifiers remain",
            count, free
        )));
    }

    let created_date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut report = ProvisionReport {
        created_date: created_date.clone(),
        ..ProvisionReport::default()
    };

    if !table.contains_key(ADMIN_USER_ID) {
        table.insert(
            ADMIN_USER_ID.to_string(),
            new_record(secret, ADMIN_USER_ID, Role::Admin, max_tokens, &created_date)?,
        );
        report.admin_created = true;
    }

    while report.added.len() < count {
        let user_id = generate_readable_id(rng);
        if table.contains_key(&user_id) {
            continue;
        }
        let record = new_record(secret, &user_id, Role::User, max_tokens, &created_date)?;
        table.insert(user_id.clone(), record);
        report.added.push(user_id);
    }

    Ok(report)
}

/// Legacy flat `{id: token}` invite mapping with `count` distinct entries.
pub fn create_invites<R: Rng + ?Sized>(
    secret: &InviteSecret,
    count: usize,
    rng: &mut R,
) -> Result<BTreeMap<String, String>, ApiError> {
    if count > id_space() {
        return Err(ApiError::BadRequest(format!(
            "Cannot create {} invites, only {} identifiers exist",
            count,
            id_space()
        )));
    }

    let mut invites = BTreeMap::new();
    while invites.len() < count {
        let user_id = generate_readable_id(rng);
        if invites.contains_key(&user_id) {
            continue;
        }
        let token = secret.derive_token(&user_id)?;
        invites.insert(user_id, token);
    }
    Ok(invites)
}

fn new_record(
    secret: &InviteSecret,
    user_id: &str,
    role: Role,
    max_tokens: u64,
    created_date: &str,
) -> Result<UserRecord, ApiError> {
    let mut record = UserRecord::new(secret.derive_token(user_id)?, role, max_tokens);
    record.created_date = Some(created_date.to_string());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::defaults::DEFAULT_MAX_TOKENS;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn secret() -> InviteSecret {
        InviteSecret::new("provisioning-secret")
    }

    fn is_readable_id(id: &str) -> bool {
        let parts: Vec<&str> = id.split('-').collect();
        parts.len() == 3
            && ADJECTIVES.contains(&parts[0])
            && NOUNS.contains(&parts[1])
            && parts[2]
                .parse::<u16>()
                .map(|n| SUFFIX_RANGE.contains(&n))
                .unwrap_or(false)
    }

    #[test]
    fn readable_ids_follow_the_word_pattern() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let id = generate_readable_id(&mut rng);
            assert!(is_readable_id(&id), "unexpected id {id}");
        }
    }

    #[test]
    fn provision_creates_admin_once_and_adds_users() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut table = UserTable::new();

        let first = provision_users(&mut table, &secret(), 5, DEFAULT_MAX_TOKENS, &mut rng).unwrap();
        assert!(first.admin_created);
        assert_eq!(first.added.len(), 5);
        assert_eq!(table.len(), 6);

        let admin = &table[ADMIN_USER_ID];
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.token, secret().derive_token(ADMIN_USER_ID).unwrap());

        for user_id in &first.added {
            let record = &table[user_id];
            assert_eq!(record.role, Role::User);
            assert!(record.active);
            assert_eq!(record.used_tokens, 0);
            assert_eq!(record.max_tokens, DEFAULT_MAX_TOKENS);
            assert_eq!(record.created_date.as_deref(), Some(first.created_date.as_str()));
            assert_eq!(record.token, secret().derive_token(user_id).unwrap());
        }

        let second = provision_users(&mut table, &secret(), 3, 50, &mut rng).unwrap();
        assert!(!second.admin_created);
        assert_eq!(table.len(), 9);
        assert!(second.added.iter().all(|id| table[id].max_tokens == 50));
    }

    #[test]
    fn provision_keeps_existing_records() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut table = UserTable::new();
        let mut existing = UserRecord::new("old-token".to_string(), Role::User, 50);
        existing.used_tokens = 1234;
        table.insert("happy-otter-204".to_string(), existing.clone());

        provision_users(&mut table, &secret(), 10, DEFAULT_MAX_TOKENS, &mut rng).unwrap();

        assert_eq!(table["happy-otter-204"], existing);
    }

    #[test]
    fn provision_rejects_more_users_than_identifiers() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut table = UserTable::new();

        let err = provision_users(&mut table, &secret(), id_space() + 1, DEFAULT_MAX_TOKENS, &mut rng).unwrap_err();

        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn invites_are_distinct_and_verifiable() {
        let mut rng = StdRng::seed_from_u64(9);

        let invites = create_invites(&secret(), 20, &mut rng).unwrap();

        assert_eq!(invites.len(), 20);
        for (user_id, token) in &invites {
            assert!(is_readable_id(user_id));
            assert_eq!(token, &secret().derive_token(user_id).unwrap());
        }
    }
}
