//! Authorization decisions. Every privileged operation passes through here
//! before it reads or writes anything it is not entitled to.
//!
//! The membership check and the write it protects are separate statements, so
//! a membership change racing an offer creation is decided on whichever state
//! the check happened to read.

use std::collections::HashSet;

use agora_db::Database;
use agora_types::models::{Message, Offer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::token::TokenService;

/// The identity a validated session token speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

pub fn authenticate(tokens: &TokenService, token: &str) -> ApiResult<AuthUser> {
    tokens.validate(token).map(AuthUser).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::Unauthenticated
    })
}

/// A body that says "I am `claimed`" must agree with the token's subject.
pub fn assert_owner(claimed: Uuid, authenticated: AuthUser) -> ApiResult<()> {
    if claimed == authenticated.0 {
        Ok(())
    } else {
        warn!("Token subject {} tried to act as {}", authenticated.0, claimed);
        Err(ApiError::Forbidden)
    }
}

pub fn assert_member(db: &Database, user: AuthUser, community_id: Uuid) -> ApiResult<()> {
    if db.is_member(user.0, community_id)? {
        Ok(())
    } else {
        warn!("{} is not a member of community {}", user.0, community_id);
        Err(ApiError::Forbidden)
    }
}

/// Loads an offer the user may read. A missing offer and an offer in a
/// community the user has not joined look the same to the caller.
pub fn readable_offer(db: &Database, user: AuthUser, offer_id: Uuid) -> ApiResult<Offer> {
    let offer = db.get_offer(offer_id)?.ok_or(ApiError::Forbidden)?;
    assert_member(db, user, offer.community_id)?;
    Ok(offer)
}

/// Loads an offer only if `user` posted it. Same uniform failure as `readable_offer`.
pub fn owned_offer(db: &Database, user: AuthUser, offer_id: Uuid) -> ApiResult<Offer> {
    let offer = db.get_offer(offer_id)?.ok_or(ApiError::Forbidden)?;
    assert_owner(offer.user_id, user)?;
    Ok(offer)
}

pub fn is_participant(message: &Message, user: AuthUser) -> bool {
    message.sender_id == user.0 || message.receiver_id == user.0
}

/// Distinct senders across `messages`, in first-seen order, without `requester`.
pub fn distinct_correspondents(messages: &[Message], requester: AuthUser) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for message in messages {
        if message.sender_id == requester.0 {
            continue;
        }
        if seen.insert(message.sender_id) {
            ordered.push(message.sender_id);
        }
    }

    ordered
}

/// Users who have written to `requester` about an offer `requester` owns.
pub fn correspondents(db: &Database, requester: AuthUser, offer_id: Uuid) -> ApiResult<Vec<Uuid>> {
    let offer = owned_offer(db, requester, offer_id)?;
    let messages = db.list_messages_for_offer(offer.id)?;
    Ok(distinct_correspondents(&messages, requester))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn msg(from: Uuid, to: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            text: "hi".to_string(),
            sender_id: from,
            receiver_id: to,
            offer_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn owner_assertion_requires_exact_match() {
        let me = Uuid::new_v4();
        assert!(assert_owner(me, AuthUser(me)).is_ok());
        assert!(matches!(
            assert_owner(Uuid::new_v4(), AuthUser(me)),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn correspondents_are_deduplicated_in_first_seen_order() {
        let owner = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let messages = vec![
            msg(c, owner),
            msg(b, owner),
            msg(owner, owner),
            msg(c, owner),
            msg(owner, b),
            msg(b, owner),
        ];

        assert_eq!(distinct_correspondents(&messages, AuthUser(owner)), vec![c, b]);
    }

    #[test]
    fn no_messages_means_no_correspondents() {
        assert!(distinct_correspondents(&[], AuthUser(Uuid::new_v4())).is_empty());
    }

    #[test]
    fn participants_are_sender_or_receiver() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let m = msg(a, b);
        assert!(is_participant(&m, AuthUser(a)));
        assert!(is_participant(&m, AuthUser(b)));
        assert!(!is_participant(&m, AuthUser(Uuid::new_v4())));
    }

    #[test]
    fn authenticate_maps_token_errors() {
        let tokens = TokenService::new("guard-secret");
        let user = Uuid::new_v4();
        let token = tokens.issue(user).unwrap();

        assert_eq!(authenticate(&tokens, &token).unwrap(), AuthUser(user));
        assert!(matches!(
            authenticate(&tokens, "bogus"),
            Err(ApiError::Unauthenticated)
        ));
    }
}
