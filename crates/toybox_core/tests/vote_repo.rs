use toybox_core::store::{EntityStore, Record, StoreError};
use toybox_core::{
    BusinessRuleViolation, EntityKind, ErrorKind, MemberRepository, MemoryStore, Post,
    PostRepository, RepoError, Vote, VoteRepository, MAX_POSTS_IN_LIST,
};

fn board_with_post(voters: &[&str]) -> (MemoryStore, Post) {
    let store = MemoryStore::new();
    let members = MemberRepository::new(&store);
    members.get_or_create("author", true).unwrap();
    for uid in voters {
        members.get_or_create(uid, true).unwrap();
    }
    let post = PostRepository::new(&store).insert("author", "{}").unwrap();
    (store, post)
}

fn counters(post: &Post) -> (i64, i64, i64) {
    (post.votes_up, post.votes_down, post.votes_total)
}

fn put_raw_vote(store: &MemoryStore, vote: &Vote) {
    store
        .transaction(|tx| -> Result<(), StoreError> { tx.put(vote.to_entity()?) })
        .unwrap();
}

#[test]
fn blank_voter_is_rejected_before_any_write() {
    let (store, post) = board_with_post(&[]);
    let votes = VoteRepository::new(&store);

    let err = votes.insert_vote("", post.id, 1).unwrap_err();
    assert!(matches!(err, RepoError::InvalidField { ref name, .. } if name == "member_uid"));
    assert!(votes.query_member_votes("").is_err());
    assert_eq!(store.count(EntityKind::Vote).unwrap(), 0);

    let stored = PostRepository::new(&store).get(post.id).unwrap();
    assert_eq!(counters(&stored), (0, 0, 0));
    assert_eq!(stored.version, post.version);
}

#[test]
fn repeated_vote_cancels_and_opposite_vote_switches() {
    let (store, post) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);
    assert_eq!(counters(&post), (0, 0, 0));

    let (post, vote) = votes.insert_vote("m1", post.id, 1).unwrap();
    assert_eq!(counters(&post), (1, 0, 1));
    assert_eq!(vote.value, 1);

    let (post, vote) = votes.insert_vote("m1", post.id, 1).unwrap();
    assert_eq!(counters(&post), (0, 0, 0));
    assert_eq!(vote.value, 0);

    let (post, vote) = votes.insert_vote("m1", post.id, -1).unwrap();
    assert_eq!(counters(&post), (0, 1, -1));
    assert_eq!(vote.value, -1);
}

#[test]
fn opposite_vote_moves_each_counter_by_one() {
    let (store, post) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);

    let (after_up, _) = votes.insert_vote("m1", post.id, 1).unwrap();
    let (after_down, _) = votes.insert_vote("m1", post.id, -1).unwrap();
    assert_eq!(counters(&after_up), (1, 0, 1));
    assert_eq!(counters(&after_down), (0, 1, -1));
}

#[test]
fn versions_grow_by_one_per_vote() {
    let (store, post) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);

    let mut expected_post_version = post.version;
    for (round, value) in [1, 1, -1, 1, -1, -1].into_iter().enumerate() {
        let (post, vote) = votes.insert_vote("m1", post.id, value).unwrap();
        expected_post_version += 1;
        assert_eq!(post.version, expected_post_version);
        assert_eq!(vote.version, round as i64 + 1);
        assert_eq!(post.votes_total, post.votes_up - post.votes_down);
    }
}

#[test]
fn aggregates_sum_votes_from_many_members() {
    let (store, post) = board_with_post(&["m1", "m2", "m3"]);
    let votes = VoteRepository::new(&store);

    votes.insert_vote("m1", post.id, 1).unwrap();
    votes.insert_vote("m2", post.id, 1).unwrap();
    let (post, _) = votes.insert_vote("m3", post.id, -1).unwrap();
    assert_eq!(counters(&post), (2, 1, 1));

    let stored = PostRepository::new(&store).get(post.id).unwrap();
    assert_eq!(stored, post);
}

#[test]
fn illegal_values_are_rejected_before_any_write() {
    let (store, post) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);

    for value in [0, 2, -5] {
        let err = votes.insert_vote("m1", post.id, value).unwrap_err();
        assert!(matches!(
            err,
            RepoError::BusinessRule(BusinessRuleViolation::IllegalVoteValue(v)) if v == value
        ));
    }
    assert_eq!(store.count(EntityKind::Vote).unwrap(), 0);
}

#[test]
fn vote_on_unknown_post_is_not_found() {
    let (store, _) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);

    let err = votes.insert_vote("m1", 999, 1).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::Post,
            ..
        }
    ));
    assert_eq!(store.count(EntityKind::Vote).unwrap(), 0);
}

#[test]
fn failed_commit_leaves_vote_and_post_untouched() {
    let (store, post) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);
    votes.insert_vote("m1", post.id, 1).unwrap();

    store.fail_next_commit();
    let err = votes.insert_vote("m1", post.id, -1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Infrastructure);

    let stored = PostRepository::new(&store).get(post.id).unwrap();
    assert_eq!(counters(&stored), (1, 0, 1));
    let stored_votes = votes.query_post_votes(post.id).unwrap();
    assert_eq!(stored_votes.len(), 1);
    assert_eq!(stored_votes[0].value, 1);
    assert_eq!(stored_votes[0].version, 1);
}

#[test]
fn corrupt_stored_vote_value_is_reported() {
    let (store, post) = board_with_post(&["m1"]);
    let mut vote = Vote::pending(post.id, "m1", 1);
    vote.value = 5;
    vote.version = 1;
    put_raw_vote(&store, &vote);

    let err = VoteRepository::new(&store)
        .insert_vote("m1", post.id, 1)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::BusinessRule(BusinessRuleViolation::CorruptVoteValue { value: 5, .. })
    ));
}

#[test]
fn counter_underflow_is_reported_without_write() {
    let (store, post) = board_with_post(&["m1"]);
    let mut vote = Vote::pending(post.id, "m1", 1);
    vote.value = 1;
    vote.version = 1;
    put_raw_vote(&store, &vote);

    let err = VoteRepository::new(&store)
        .insert_vote("m1", post.id, -1)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::BusinessRule(BusinessRuleViolation::CorruptAggregate { post_id }) if post_id == post.id
    ));
    assert_eq!(PostRepository::new(&store).get(post.id).unwrap(), post);
}

#[test]
fn cancelled_votes_stay_visible_in_vote_queries() {
    let (store, post) = board_with_post(&["m1", "m2"]);
    let votes = VoteRepository::new(&store);

    votes.insert_vote("m1", post.id, 1).unwrap();
    votes.insert_vote("m1", post.id, 1).unwrap();
    votes.insert_vote("m2", post.id, -1).unwrap();

    let on_post = votes.query_post_votes(post.id).unwrap();
    assert_eq!(on_post.len(), 2);
    let cancelled = on_post.iter().find(|vote| vote.member_uid == "m1").unwrap();
    assert_eq!(cancelled.value, 0);

    assert_eq!(votes.query_member_votes("m2").unwrap().len(), 1);
    assert_eq!(votes.query_all().unwrap().len(), 2);
}

#[test]
fn batch_lookup_returns_only_existing_votes() {
    let (store, post) = board_with_post(&["m1"]);
    let votes = VoteRepository::new(&store);
    votes.insert_vote("m1", post.id, -1).unwrap();

    assert!(votes.query_member_votes_for("m1", &[]).unwrap().is_empty());

    let found = votes
        .query_member_votes_for("m1", &[post.id, post.id + 100])
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].post_id, post.id);
}

#[test]
fn projection_fills_my_vote_and_authorship() {
    let store = MemoryStore::new();
    let members = MemberRepository::new(&store);
    members.get_or_create("m1", true).unwrap();
    members.get_or_create("m2", true).unwrap();
    let posts = PostRepository::new(&store);
    let votes = VoteRepository::new(&store);

    let own = posts.insert("m1", r#"{"content":"mine"}"#).unwrap();
    let other = posts.insert("m2", r#"{"content":"theirs"}"#).unwrap();
    votes.insert_vote("m1", other.id, 1).unwrap();

    let views = votes
        .query_posts_with_votes("m1", posts.query_all().unwrap())
        .unwrap();
    assert_eq!(views.len(), 2);

    assert_eq!(views[0].uid, other.id);
    assert!(!views[0].can_delete);
    assert_eq!(views[0].my_vote_value, Some(1));
    assert_eq!(views[0].data["content"], "theirs");

    assert_eq!(views[1].uid, own.id);
    assert!(views[1].can_delete);
    assert_eq!(views[1].my_vote_value, None);

    let json = serde_json::to_value(&views[1]).unwrap();
    assert!(json["my_vote_value"].is_null());
}

#[test]
fn projection_is_capped() {
    let (store, template) = board_with_post(&[]);
    let posts = (0..MAX_POSTS_IN_LIST as i64 + 20)
        .map(|offset| Post {
            id: template.id + offset,
            ..template.clone()
        })
        .collect::<Vec<_>>();

    let views = VoteRepository::new(&store)
        .query_posts_with_votes("author", posts)
        .unwrap();
    assert_eq!(views.len(), MAX_POSTS_IN_LIST);
}
