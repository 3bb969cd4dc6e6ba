//! Match records and their status state machine.
//!
//! A match is one document per unordered user pair. The pair is stored in
//! canonical order (smaller ObjectId first) so the unique index on
//! `{user1, user2}` enforces the one-document-per-pair invariant no matter
//! which side swipes first. Status moves through explicit transition
//! functions invoked at write time; mutual, expired, and blocked are all
//! terminal.

use bson::{DateTime, oid::ObjectId};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::user::Category;

pub const MATCH_COLLECTION: &str = "matches";

/// Default lifetime of a pending match.
pub const MATCH_TTL_DAYS: i64 = 7;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    UserToUser,
    UserToProject,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Mutual,
    Expired,
    Blocked,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Like,
    Pass,
    SuperLike,
    Pending,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct UserAction {
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime>,
}

impl UserAction {
    fn pending() -> Self {
        Self {
            action: Action::Pending,
            timestamp: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub common_categories: Vec<Category>,
    pub reason_for_match: String,
    pub confidence_level: ConfidenceLevel,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime>,
    pub message_count: i64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            started: false,
            started_at: None,
            last_message_at: None,
            message_count: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub from_user: ObjectId,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime,
}

/// Orders a pair of user ids canonically. The same two users always map to
/// the same (user1, user2) tuple.
pub fn canonical_pair(a: ObjectId, b: ObjectId) -> (ObjectId, ObjectId) {
    if a.bytes() <= b.bytes() {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user1: ObjectId,
    pub user2: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ObjectId>,
    pub match_type: MatchType,
    pub status: MatchStatus,
    pub initiated_by: ObjectId,
    pub user1_action: UserAction,
    pub user2_action: UserAction,
    pub compatibility_score: f64,
    pub match_details: MatchDetails,
    pub conversation: Conversation,
    pub feedback: Vec<Feedback>,
    pub expires_at: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Match {
    /// Creates a match with the initiator's first action already applied.
    pub fn new(
        initiator: ObjectId,
        target: ObjectId,
        project: Option<ObjectId>,
        action: Action,
        compatibility_score: f64,
        match_details: MatchDetails,
        now: DateTime,
    ) -> Self {
        let (user1, user2) = canonical_pair(initiator, target);
        let initiator_action = UserAction {
            action,
            timestamp: Some(now),
        };
        let (user1_action, user2_action) = if user1 == initiator {
            (initiator_action, UserAction::pending())
        } else {
            (UserAction::pending(), initiator_action)
        };

        let expires_at = DateTime::from_chrono(now.to_chrono() + chrono::Duration::days(MATCH_TTL_DAYS));

        Self {
            id: None,
            user1,
            user2,
            project,
            match_type: if project.is_some() {
                MatchType::UserToProject
            } else {
                MatchType::UserToUser
            },
            status: MatchStatus::Pending,
            initiated_by: initiator,
            user1_action,
            user2_action,
            compatibility_score,
            match_details,
            conversation: Conversation::default(),
            feedback: Vec::new(),
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user_id: &ObjectId) -> bool {
        self.user1 == *user_id || self.user2 == *user_id
    }

    pub fn other_user(&self, user_id: &ObjectId) -> ObjectId {
        if self.user1 == *user_id {
            self.user2
        } else {
            self.user1
        }
    }

    pub fn action_of(&self, user_id: &ObjectId) -> UserAction {
        if self.user1 == *user_id {
            self.user1_action
        } else {
            self.user2_action
        }
    }

    /// Records a swipe by one of the two users and refreshes the status.
    pub fn record_action(
        &mut self,
        user_id: &ObjectId,
        action: Action,
        now: DateTime,
    ) -> Result<(), AppError> {
        let side = if self.user1 == *user_id {
            &mut self.user1_action
        } else if self.user2 == *user_id {
            &mut self.user2_action
        } else {
            return Err(AppError::Forbidden(
                "User is not part of this match".to_string(),
            ));
        };

        *side = UserAction {
            action,
            timestamp: Some(now),
        };
        self.updated_at = now;
        self.refresh_status(now);
        Ok(())
    }

    /// Applies the two legal pending transitions. Mutual wins over expiry
    /// when both would apply at the same instant; terminal states never
    /// change.
    pub fn refresh_status(&mut self, now: DateTime) {
        if self.status != MatchStatus::Pending {
            return;
        }

        if self.user1_action.action == Action::Like && self.user2_action.action == Action::Like {
            self.status = MatchStatus::Mutual;
            return;
        }

        if now >= self.expires_at {
            self.status = MatchStatus::Expired;
        }
    }

    pub fn start_conversation(&mut self, now: DateTime) -> Result<(), AppError> {
        if self.status != MatchStatus::Mutual {
            return Err(AppError::Validation(
                "Can only start conversation on mutual matches".to_string(),
            ));
        }
        self.conversation.started = true;
        self.conversation.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn add_feedback(
        &mut self,
        from_user: ObjectId,
        rating: u8,
        comment: Option<String>,
        now: DateTime,
    ) {
        self.feedback.push(Feedback {
            from_user,
            rating,
            comment,
            created_at: now,
        });
        self.updated_at = now;
    }

    pub fn is_live(&self, now: DateTime) -> bool {
        self.status != MatchStatus::Expired
            && self.status != MatchStatus::Blocked
            && self.expires_at > now
    }

    pub fn age_in_hours(&self, now: chrono::DateTime<Utc>) -> i64 {
        (now - self.created_at.to_chrono()).num_hours().max(0)
    }

    pub fn hours_until_expiry(&self, now: chrono::DateTime<Utc>) -> i64 {
        (self.expires_at.to_chrono() - now).num_hours().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Category;

    fn details() -> MatchDetails {
        MatchDetails {
            common_categories: vec![Category::Technology],
            reason_for_match: "shared interests".to_string(),
            confidence_level: ConfidenceLevel::Medium,
        }
    }

    fn new_match(initiator: ObjectId, target: ObjectId, action: Action) -> Match {
        Match::new(initiator, target, None, action, 55.0, details(), DateTime::now())
    }

    #[test]
    fn test_canonical_pair_is_order_insensitive() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
    }

    #[test]
    fn test_initiator_action_lands_on_correct_side() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let m = new_match(a, b, Action::Like);

        assert_eq!(m.action_of(&a).action, Action::Like);
        assert_eq!(m.action_of(&b).action, Action::Pending);
        assert_eq!(m.initiated_by, a);
        assert_eq!(m.status, MatchStatus::Pending);
    }

    #[test]
    fn test_mutual_iff_both_like() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);

        m.record_action(&b, Action::Like, DateTime::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Mutual);
    }

    #[test]
    fn test_pass_does_not_make_mutual() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);

        m.record_action(&b, Action::Pass, DateTime::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Pending);
    }

    #[test]
    fn test_super_like_does_not_count_as_like_for_mutuality() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::SuperLike);

        m.record_action(&b, Action::Like, DateTime::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Pending);
    }

    #[test]
    fn test_mutual_does_not_regress_on_later_pass() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);
        m.record_action(&b, Action::Like, DateTime::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Mutual);

        m.record_action(&a, Action::Pass, DateTime::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Mutual);
    }

    #[test]
    fn test_pending_expires_after_deadline() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);

        let after_expiry =
            DateTime::from_chrono(m.expires_at.to_chrono() + chrono::Duration::hours(1));
        m.refresh_status(after_expiry);
        assert_eq!(m.status, MatchStatus::Expired);
    }

    #[test]
    fn test_blocked_is_terminal() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);
        m.status = MatchStatus::Blocked;

        m.record_action(&b, Action::Like, DateTime::now()).unwrap();
        assert_eq!(m.status, MatchStatus::Blocked);
    }

    #[test]
    fn test_outsider_cannot_act() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);

        assert!(
            m.record_action(&ObjectId::new(), Action::Like, DateTime::now())
                .is_err()
        );
    }

    #[test]
    fn test_conversation_requires_mutual() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let mut m = new_match(a, b, Action::Like);

        assert!(m.start_conversation(DateTime::now()).is_err());

        m.record_action(&b, Action::Like, DateTime::now()).unwrap();
        m.start_conversation(DateTime::now()).unwrap();
        assert!(m.conversation.started);
        assert!(m.conversation.started_at.is_some());
    }

    #[test]
    fn test_expiry_window_is_seven_days() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let m = new_match(a, b, Action::Like);
        let lifetime = m.expires_at.to_chrono() - m.created_at.to_chrono();
        assert_eq!(lifetime.num_days(), MATCH_TTL_DAYS);
    }

    #[test]
    fn test_other_user() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let m = new_match(a, b, Action::Like);
        assert_eq!(m.other_user(&a), b);
        assert_eq!(m.other_user(&b), a);
        assert!(m.involves(&a) && m.involves(&b));
        assert!(!m.involves(&ObjectId::new()));
    }
}
