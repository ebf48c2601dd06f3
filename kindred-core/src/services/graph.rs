//! Like / pass state machine and the safety mutations that tear a pair
//! down again.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::auth::IdentityResolver;

use crate::models::{
    Block, Conversation, Edge, EdgeStatus, IncomingLike, LikeOutcome, MatchSummary, ProfileId,
    Rejection, Report, ReportOutcome,
};
use crate::notify::Notification;
use crate::services::identity::{caller_profile, profile_not_found, require_identity};
use crate::services::Core;
use crate::store::Repo;

/// True when either user has blocked the other.
pub(crate) fn blocked_either(repo: &mut dyn Repo, a: ProfileId, b: ProfileId) -> AppResult<bool> {
    Ok(repo.find_block(a, b)?.is_some() || repo.find_block(b, a)?.is_some())
}

fn reject_self(me: ProfileId, target: ProfileId) -> AppResult<()> {
    if me == target {
        return Err(AppError::new(
            ErrorCode::CannotTargetSelf,
            "this action cannot target your own profile",
        ));
    }
    Ok(())
}

/// Deletes everything derived from the pair's like edges: the conversation
/// and its messages first, then both edges. Safe to run repeatedly.
pub fn teardown_pair(repo: &mut dyn Repo, a: ProfileId, b: ProfileId) -> AppResult<()> {
    let edges: Vec<Edge> = [repo.find_edge(a, b)?, repo.find_edge(b, a)?]
        .into_iter()
        .flatten()
        .collect();

    for edge in &edges {
        if let Some(conversation) = repo.find_conversation_by_match(edge.id)? {
            repo.delete_messages(conversation.id)?;
            repo.delete_conversation(conversation.id)?;
        }
    }
    for edge in &edges {
        repo.delete_edge(edge.id)?;
    }
    Ok(())
}

/// Conversation attached to either edge of a pair, if any.
fn pair_conversation(
    repo: &mut dyn Repo,
    edge_id: Uuid,
    other_edge_id: Option<Uuid>,
) -> AppResult<Option<Conversation>> {
    if let Some(conversation) = repo.find_conversation_by_match(edge_id)? {
        return Ok(Some(conversation));
    }
    match other_edge_id {
        Some(id) => repo.find_conversation_by_match(id),
        None => Ok(None),
    }
}

impl Core {
    pub fn like(&self, auth: &dyn IdentityResolver, target: ProfileId) -> AppResult<LikeOutcome> {
        let identity = require_identity(auth)?;
        let now = self.now();

        let (outcome, notifications) = self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            reject_self(me.id, target)?;
            let them = repo.find_profile(target)?.ok_or_else(profile_not_found)?;
            if blocked_either(repo, me.id, them.id)? {
                return Err(AppError::new(ErrorCode::PairBlocked, "you cannot like this profile"));
            }

            let mut notifications = Vec::new();
            let reverse = repo.find_edge(them.id, me.id)?;

            let outcome = match reverse {
                Some(reverse) if reverse.status != EdgeStatus::Rejected => {
                    let newly_matched = reverse.status == EdgeStatus::Pending;
                    if newly_matched {
                        repo.set_edge_status(reverse.id, EdgeStatus::Accepted, now)?;
                    }

                    let own_id = match repo.find_edge(me.id, them.id)? {
                        Some(own) => {
                            if own.status != EdgeStatus::Accepted {
                                repo.set_edge_status(own.id, EdgeStatus::Accepted, now)?;
                            }
                            own.id
                        }
                        None => {
                            let own = Edge::new(me.id, them.id, EdgeStatus::Accepted, now);
                            repo.insert_edge(&own)?;
                            own.id
                        }
                    };

                    let conversation = match pair_conversation(repo, reverse.id, Some(own_id))? {
                        Some(existing) => existing,
                        None => {
                            let conversation = open_conversation(reverse.id, them.id, me.id, now);
                            repo.insert_conversation(&conversation)?;
                            conversation
                        }
                    };

                    if newly_matched {
                        notifications.push(Notification::matched(
                            them.id,
                            me.name.as_deref(),
                            conversation.id,
                        ));
                        notifications.push(Notification::matched(
                            me.id,
                            them.name.as_deref(),
                            conversation.id,
                        ));
                    }

                    LikeOutcome::Matched {
                        match_id: reverse.id,
                        conversation_id: conversation.id,
                    }
                }
                _ => match repo.find_edge(me.id, them.id)? {
                    Some(own) => LikeOutcome::Pending { match_id: own.id },
                    None => {
                        let own = Edge::new(me.id, them.id, EdgeStatus::Pending, now);
                        repo.insert_edge(&own)?;
                        notifications.push(Notification::new_like(them.id, me.name.as_deref()));
                        LikeOutcome::Pending { match_id: own.id }
                    }
                },
            };

            Ok((outcome, notifications))
        })?;

        metrics::counter!("kindred_likes_total").increment(1);
        if let LikeOutcome::Matched { conversation_id, .. } = &outcome {
            if !notifications.is_empty() {
                metrics::counter!("kindred_matches_total").increment(1);
                tracing::info!(conversation_id = %conversation_id, target = %target, "mutual like, match created");
            }
        }
        self.dispatch(notifications);
        Ok(outcome)
    }

    pub fn pass(&self, auth: &dyn IdentityResolver, target: ProfileId) -> AppResult<()> {
        let identity = require_identity(auth)?;
        let now = self.now();

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            reject_self(me.id, target)?;
            repo.find_profile(target)?.ok_or_else(profile_not_found)?;

            if repo.find_rejection(me.id, target)?.is_none() {
                repo.insert_rejection(&Rejection {
                    id: Uuid::now_v7(),
                    user_id: me.id,
                    rejected_user_id: target,
                    created_at: now,
                })?;
            }

            if let Some(incoming) = repo.find_edge(target, me.id)? {
                if incoming.status == EdgeStatus::Pending {
                    repo.set_edge_status(incoming.id, EdgeStatus::Rejected, now)?;
                }
            }
            Ok(())
        })
    }

    pub fn block(&self, auth: &dyn IdentityResolver, target: ProfileId) -> AppResult<()> {
        let identity = require_identity(auth)?;
        let now = self.now();

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            reject_self(me.id, target)?;
            repo.find_profile(target)?.ok_or_else(profile_not_found)?;
            insert_block_if_absent(repo, me.id, target, now)?;
            teardown_pair(repo, me.id, target)
        })?;

        metrics::counter!("kindred_blocks_total").increment(1);
        tracing::info!(target = %target, "profile blocked");
        Ok(())
    }

    /// Records a report. Reporting implies blocking unless the caller has
    /// already blocked the target.
    pub fn report(
        &self,
        auth: &dyn IdentityResolver,
        target: ProfileId,
        reason: &str,
        description: Option<&str>,
    ) -> AppResult<ReportOutcome> {
        let identity = require_identity(auth)?;
        let reason = reason.trim();
        if reason.is_empty() || reason.chars().count() > 100 {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "report reason must be between 1 and 100 characters",
            ));
        }
        let now = self.now();

        let outcome = self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            reject_self(me.id, target)?;
            repo.find_profile(target)?.ok_or_else(profile_not_found)?;

            let report = Report {
                id: Uuid::now_v7(),
                reporter_id: me.id,
                reported_id: target,
                reason: reason.to_string(),
                description: description.map(str::to_string),
                created_at: now,
            };
            repo.insert_report(&report)?;

            let blocked = insert_block_if_absent(repo, me.id, target, now)?;
            if blocked {
                teardown_pair(repo, me.id, target)?;
            }
            Ok(ReportOutcome {
                report_id: report.id,
                blocked,
            })
        })?;

        metrics::counter!("kindred_reports_total").increment(1);
        tracing::info!(report_id = %outcome.report_id, target = %target, blocked = outcome.blocked, "profile reported");
        Ok(outcome)
    }

    /// Removes a match and its conversation without blocking.
    pub fn unmatch(&self, auth: &dyn IdentityResolver, match_id: Uuid) -> AppResult<()> {
        let identity = require_identity(auth)?;

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let edge = repo
                .find_edge_by_id(match_id)?
                .ok_or_else(|| AppError::new(ErrorCode::MatchNotFound, "match not found"))?;
            if !edge.involves(me.id) {
                return Err(AppError::new(
                    ErrorCode::NotMatchParticipant,
                    "you are not part of this match",
                ));
            }

            let counterpart = repo
                .find_edge(edge.user_b, edge.user_a)?
                .filter(|e| e.status == EdgeStatus::Accepted);
            if let Some(conversation) = pair_conversation(repo, edge.id, counterpart.as_ref().map(|e| e.id))? {
                repo.delete_messages(conversation.id)?;
                repo.delete_conversation(conversation.id)?;
            }
            repo.delete_edge(edge.id)?;
            if let Some(counterpart) = counterpart {
                repo.delete_edge(counterpart.id)?;
            }
            Ok(())
        })?;

        tracing::info!(match_id = %match_id, "match removed");
        Ok(())
    }

    /// Mutual matches of the caller, newest first.
    pub fn list_matches(&self, auth: &dyn IdentityResolver) -> AppResult<Vec<MatchSummary>> {
        let identity = require_identity(auth)?;

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let accepted: Vec<Edge> = repo
                .edges_from(me.id)?
                .into_iter()
                .filter(|e| e.status == EdgeStatus::Accepted)
                .collect();
            let ids: Vec<ProfileId> = accepted.iter().map(|e| e.user_b).collect();
            let profiles = repo.find_profiles(&ids)?;

            let mut summaries = Vec::with_capacity(accepted.len());
            for edge in accepted {
                let Some(profile) = profiles.iter().find(|p| p.id == edge.user_b) else {
                    continue;
                };
                let reverse = repo.find_edge(edge.user_b, me.id)?;
                let conversation = pair_conversation(repo, edge.id, reverse.map(|e| e.id))?;
                summaries.push(MatchSummary {
                    match_id: edge.id,
                    conversation_id: conversation.map(|c| c.id),
                    profile: profile.clone(),
                    matched_at: edge.updated_at,
                });
            }
            summaries.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
            Ok(summaries)
        })
    }

    /// Pending likes addressed to the caller that can still be answered.
    pub fn incoming_likes(&self, auth: &dyn IdentityResolver) -> AppResult<Vec<IncomingLike>> {
        let identity = require_identity(auth)?;

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let pending: Vec<Edge> = repo
                .edges_to(me.id)?
                .into_iter()
                .filter(|e| e.status == EdgeStatus::Pending)
                .collect();
            let ids: Vec<ProfileId> = pending.iter().map(|e| e.user_a).collect();
            let profiles = repo.find_profiles(&ids)?;

            let mut likes = Vec::with_capacity(pending.len());
            for edge in pending {
                if blocked_either(repo, me.id, edge.user_a)? {
                    continue;
                }
                if let Some(profile) = profiles.iter().find(|p| p.id == edge.user_a) {
                    likes.push(IncomingLike {
                        match_id: edge.id,
                        profile: profile.clone(),
                        liked_at: edge.created_at,
                    });
                }
            }
            Ok(likes)
        })
    }
}

/// Returns true when a new block row was written.
fn insert_block_if_absent(
    repo: &mut dyn Repo,
    blocker: ProfileId,
    blocked: ProfileId,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    if repo.find_block(blocker, blocked)?.is_some() {
        return Ok(false);
    }
    repo.insert_block(&Block {
        id: Uuid::now_v7(),
        blocker_id: blocker,
        blocked_id: blocked,
        created_at: now,
    })?;
    Ok(true)
}

/// `first_liker` becomes user1 so the conversation mirrors the edge it
/// references.
fn open_conversation(
    match_id: Uuid,
    first_liker: ProfileId,
    second_liker: ProfileId,
    now: DateTime<Utc>,
) -> Conversation {
    Conversation {
        id: Uuid::now_v7(),
        match_id,
        user1_id: first_liker,
        user2_id: second_liker,
        last_message: None,
        last_message_at: now,
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use kindred_shared::errors::ErrorKind;

    use super::*;
    use crate::models::MessageType;
    use crate::services::testing::{anonymous, harness, unknown_id, Harness};

    struct Pair {
        a: String,
        b: String,
        a_id: ProfileId,
        b_id: ProfileId,
    }

    fn pair(h: &Harness) -> Pair {
        let a = "auth0|ana".to_string();
        let b = "auth0|ben".to_string();
        let a_id = h.onboard(&a, "woman", "man");
        let b_id = h.onboard(&b, "man", "woman");
        Pair { a, b, a_id, b_id }
    }

    fn edge_status(h: &Harness, from: ProfileId, to: ProfileId) -> Option<EdgeStatus> {
        h.store
            .snapshot()
            .edges()
            .iter()
            .find(|e| e.user_a == from && e.user_b == to)
            .map(|e| e.status)
    }

    #[test]
    fn mutual_like_creates_one_conversation_in_either_order() {
        for reversed in [false, true] {
            let h = harness();
            let p = pair(&h);
            let (first, second, second_target, first_target) = if reversed {
                (&p.b, &p.a, p.b_id, p.a_id)
            } else {
                (&p.a, &p.b, p.a_id, p.b_id)
            };

            assert!(matches!(h.core.like(first, first_target).unwrap(), LikeOutcome::Pending { .. }));
            let outcome = h.core.like(second, second_target).unwrap();
            let LikeOutcome::Matched { match_id, conversation_id } = outcome else {
                panic!("expected a match, got {outcome:?}");
            };

            let snapshot = h.store.snapshot();
            assert_eq!(snapshot.conversations().len(), 1);
            assert_eq!(snapshot.conversations()[0].id, conversation_id);
            assert_eq!(snapshot.conversations()[0].match_id, match_id);
            assert_eq!(edge_status(&h, p.a_id, p.b_id), Some(EdgeStatus::Accepted));
            assert_eq!(edge_status(&h, p.b_id, p.a_id), Some(EdgeStatus::Accepted));
        }
    }

    #[test]
    fn match_notifies_both_and_repeat_like_is_silent() {
        let h = harness();
        let p = pair(&h);
        h.core.like(&p.a, p.b_id).unwrap();
        assert_eq!(h.notifier.sent_to(p.b_id).len(), 1);

        h.notifier.clear();
        let first = h.core.like(&p.b, p.a_id).unwrap();
        assert_eq!(h.notifier.sent_to(p.a_id).len(), 1);
        assert_eq!(h.notifier.sent_to(p.b_id).len(), 1);

        h.notifier.clear();
        let again = h.core.like(&p.b, p.a_id).unwrap();
        let again_other_side = h.core.like(&p.a, p.b_id).unwrap();
        assert_eq!(first, again);
        assert!(matches!(again_other_side, LikeOutcome::Matched { .. }));
        assert!(h.notifier.sent().is_empty());
        assert_eq!(h.store.snapshot().conversations().len(), 1);
    }

    #[test]
    fn repeated_like_keeps_a_single_pending_edge() {
        let h = harness();
        let p = pair(&h);
        let first = h.core.like(&p.a, p.b_id).unwrap();
        let second = h.core.like(&p.a, p.b_id).unwrap();

        assert_eq!(first, second);
        assert_eq!(h.store.snapshot().edges().len(), 1);
        assert_eq!(h.notifier.sent_to(p.b_id).len(), 1);
    }

    #[test]
    fn pass_rejects_incoming_like_and_hides_the_liker() {
        let h = harness();
        let p = pair(&h);
        h.core.like(&p.a, p.b_id).unwrap();
        h.notifier.clear();
        h.core.pass(&p.b, p.a_id).unwrap();
        h.core.pass(&p.b, p.a_id).unwrap();

        assert_eq!(edge_status(&h, p.a_id, p.b_id), Some(EdgeStatus::Rejected));
        let snapshot = h.store.snapshot();
        assert_eq!(snapshot.rejections().len(), 1);
        assert_eq!(snapshot.rejections()[0].user_id, p.b_id);
        assert!(h.notifier.sent().is_empty());

        assert!(h.core.discover(&p.b, None).unwrap().iter().all(|c| c.profile.id != p.a_id));
        assert!(h.core.incoming_likes(&p.b).unwrap().is_empty());

        // A liking again after being passed stays inert.
        assert!(matches!(h.core.like(&p.a, p.b_id).unwrap(), LikeOutcome::Pending { .. }));
        assert_eq!(edge_status(&h, p.a_id, p.b_id), Some(EdgeStatus::Rejected));
    }

    #[test]
    fn self_targeting_is_a_validation_error() {
        let h = harness();
        let p = pair(&h);
        for err in [
            h.core.like(&p.a, p.a_id).unwrap_err(),
            h.core.pass(&p.a, p.a_id).unwrap_err(),
            h.core.block(&p.a, p.a_id).unwrap_err(),
            h.core.report(&p.a, p.a_id, "spam", None).unwrap_err(),
        ] {
            assert_eq!(err.code(), Some(ErrorCode::CannotTargetSelf));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn unknown_target_and_anonymous_caller() {
        let h = harness();
        let p = pair(&h);
        assert_eq!(h.core.like(&p.a, unknown_id()).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            h.core.like(&anonymous(), p.b_id).unwrap_err().kind(),
            ErrorKind::Authentication
        );
    }

    #[test]
    fn block_tears_down_everything_and_is_idempotent() {
        let h = harness();
        let p = pair(&h);
        h.core.like(&p.a, p.b_id).unwrap();
        let LikeOutcome::Matched { conversation_id, .. } = h.core.like(&p.b, p.a_id).unwrap() else {
            panic!("expected match");
        };
        h.core
            .send_message(&p.a, conversation_id, "hi!", MessageType::Text)
            .unwrap();

        h.core.block(&p.a, p.b_id).unwrap();
        h.core.block(&p.a, p.b_id).unwrap();

        let snapshot = h.store.snapshot();
        assert!(snapshot.edges().is_empty());
        assert!(snapshot.conversations().is_empty());
        assert!(snapshot.messages().is_empty());
        assert_eq!(snapshot.blocks().len(), 1);

        let err = h.core.like(&p.b, p.a_id).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::PairBlocked));
        assert_eq!(err.kind(), ErrorKind::Policy);
    }

    #[test]
    fn report_implies_block_once() {
        let h = harness();
        let p = pair(&h);
        h.core.like(&p.a, p.b_id).unwrap();

        let first = h.core.report(&p.b, p.a_id, "spam", Some("sent links")).unwrap();
        assert!(first.blocked);
        let second = h.core.report(&p.b, p.a_id, "harassment", None).unwrap();
        assert!(!second.blocked);

        let snapshot = h.store.snapshot();
        assert_eq!(snapshot.reports().len(), 2);
        assert_eq!(snapshot.blocks().len(), 1);
        assert!(snapshot.edges().is_empty());

        let err = h.core.report(&p.b, p.a_id, "   ", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn report_after_reverse_block_still_blocks_in_reporters_direction() {
        let h = harness();
        let p = pair(&h);
        h.core.block(&p.a, p.b_id).unwrap();
        let outcome = h.core.report(&p.b, p.a_id, "fake profile", None).unwrap();
        assert!(outcome.blocked);
        assert_eq!(h.store.snapshot().blocks().len(), 2);
    }

    #[test]
    fn unmatch_checks_participation_and_cascades() {
        let h = harness();
        let p = pair(&h);
        let outsider = "auth0|eve".to_string();
        h.onboard(&outsider, "woman", "everyone");

        h.core.like(&p.a, p.b_id).unwrap();
        let LikeOutcome::Matched { match_id, conversation_id } = h.core.like(&p.b, p.a_id).unwrap() else {
            panic!("expected match");
        };
        h.core.send_message(&p.b, conversation_id, "hey", MessageType::Text).unwrap();

        let err = h.core.unmatch(&outsider, match_id).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotMatchParticipant));
        assert_eq!(h.core.unmatch(&p.a, unknown_id()).unwrap_err().code(), Some(ErrorCode::MatchNotFound));

        // Unmatching through the caller's own edge id finds the conversation
        // through the counterpart edge.
        let own_edge = h.core.list_matches(&p.b).unwrap()[0].match_id;
        assert_ne!(own_edge, match_id);
        h.core.unmatch(&p.b, own_edge).unwrap();

        let snapshot = h.store.snapshot();
        assert!(snapshot.edges().is_empty());
        assert!(snapshot.conversations().is_empty());
        assert!(snapshot.messages().is_empty());
        assert!(snapshot.blocks().is_empty());
        assert_eq!(h.core.unmatch(&p.a, match_id).unwrap_err().code(), Some(ErrorCode::MatchNotFound));
    }

    #[test]
    fn unmatch_leaves_a_pending_reverse_like() {
        let h = harness();
        let p = pair(&h);
        let LikeOutcome::Pending { match_id } = h.core.like(&p.a, p.b_id).unwrap() else {
            panic!("expected pending like");
        };
        h.core.pass(&p.b, p.a_id).unwrap();
        assert!(matches!(h.core.like(&p.b, p.a_id).unwrap(), LikeOutcome::Pending { .. }));

        h.core.unmatch(&p.a, match_id).unwrap();

        assert_eq!(edge_status(&h, p.a_id, p.b_id), None);
        assert_eq!(edge_status(&h, p.b_id, p.a_id), Some(EdgeStatus::Pending));
    }

    #[test]
    fn matches_and_incoming_likes_are_listed() {
        let h = harness();
        let p = pair(&h);
        let cara = "auth0|cara".to_string();
        let cara_id = h.onboard(&cara, "woman", "man");

        h.core.like(&p.a, p.b_id).unwrap();
        h.core.like(&cara, p.b_id).unwrap();
        let incoming = h.core.incoming_likes(&p.b).unwrap();
        assert_eq!(incoming.len(), 2);

        h.core.block(&p.b, cara_id).unwrap();
        let incoming = h.core.incoming_likes(&p.b).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].profile.id, p.a_id);

        h.core.like(&p.b, p.a_id).unwrap();
        let matches = h.core.list_matches(&p.a).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].profile.id, p.b_id);
        assert!(matches[0].conversation_id.is_some());
        assert!(h.core.incoming_likes(&p.b).unwrap().is_empty());
    }

    #[test]
    fn concurrent_opposite_likes_converge() {
        for _ in 0..200 {
            let h = harness();
            let p = pair(&h);
            let core = Arc::new(h.core.clone());
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = [(p.a.clone(), p.b_id), (p.b.clone(), p.a_id)]
                .into_iter()
                .map(|(who, target)| {
                    let core = core.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        core.like(&who, target).unwrap()
                    })
                })
                .collect();
            let outcomes: Vec<LikeOutcome> = handles.into_iter().map(|t| t.join().unwrap()).collect();

            let matched = outcomes
                .iter()
                .filter(|o| matches!(o, LikeOutcome::Matched { .. }))
                .count();
            assert_eq!(matched, 1);

            let snapshot = h.store.snapshot();
            assert_eq!(snapshot.conversations().len(), 1);
            assert_eq!(snapshot.edges().len(), 2);
            assert!(snapshot.edges().iter().all(|e| e.status == EdgeStatus::Accepted));
        }
    }
}
