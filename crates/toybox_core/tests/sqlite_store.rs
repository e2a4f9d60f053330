use toybox_core::db::migrations::{current_user_version, latest_version};
use toybox_core::db::open_db;
use toybox_core::{
    BusinessRuleViolation, EntityKind, ErrorKind, MemberRepository, PostRepository, RepoError,
    SqliteStore, VoteRepository,
};

fn seeded(store: &SqliteStore, uids: &[&str]) {
    let members = MemberRepository::new(store);
    for uid in uids {
        members.get_or_create(uid, true).unwrap();
    }
}

#[test]
fn vote_sequence_matches_memory_semantics() {
    let store = SqliteStore::open_in_memory().unwrap();
    seeded(&store, &["m1"]);
    let post = PostRepository::new(&store).insert("m1", "{}").unwrap();
    let votes = VoteRepository::new(&store);

    let expected = [(1, (1, 0, 1)), (1, (0, 0, 0)), (-1, (0, 1, -1))];
    for (value, counters) in expected {
        let (post, _) = votes.insert_vote("m1", post.id, value).unwrap();
        assert_eq!((post.votes_up, post.votes_down, post.votes_total), counters);
    }

    let stored = PostRepository::new(&store).get(post.id).unwrap();
    assert_eq!(stored.version, 4);
    assert_eq!(votes.query_post_votes(post.id).unwrap().len(), 1);
}

#[test]
fn member_etag_conflict_is_detected() {
    let store = SqliteStore::open_in_memory().unwrap();
    let members = MemberRepository::new(&store);
    members.get_or_create("m1", true).unwrap();

    let updated = members.update("m1", r#"{"k":1}"#, Some(1)).unwrap();
    assert_eq!(updated.version, 2);

    let err = members.update("m1", r#"{"k":2}"#, Some(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(members.get("m1").unwrap().unwrap().data, r#"{"k":1}"#);
}

#[test]
fn rejected_insert_consumes_no_post_id() {
    let store = SqliteStore::open_in_memory().unwrap();
    seeded(&store, &["m1"]);
    let posts = PostRepository::new(&store);

    posts.insert("m1", "not json").unwrap_err();
    let post = posts.insert("m1", "{}").unwrap();
    assert_eq!(post.id, 1);
}

#[test]
fn soft_delete_and_access_rules_hold() {
    let store = SqliteStore::open_in_memory().unwrap();
    seeded(&store, &["m1", "m2"]);
    let posts = PostRepository::new(&store);
    let post = posts.insert("m1", "{}").unwrap();

    let err = posts.mark_deleted("m2", post.id).unwrap_err();
    assert!(matches!(
        err,
        RepoError::BusinessRule(BusinessRuleViolation::AccessDenied { .. })
    ));

    posts.mark_deleted("m1", post.id).unwrap();
    assert!(posts.query_all().unwrap().is_empty());
    assert!(posts.get(post.id).unwrap().is_deleted);
}

#[test]
fn list_order_breaks_ties_by_insertion() {
    let store = SqliteStore::open_in_memory().unwrap();
    seeded(&store, &["m1", "m2"]);
    let posts = PostRepository::new(&store);
    let votes = VoteRepository::new(&store);

    let first = posts.insert("m1", "{}").unwrap();
    let second = posts.insert("m1", "{}").unwrap();
    let third = posts.insert("m1", "{}").unwrap();
    votes.insert_vote("m2", third.id, 1).unwrap();
    votes.insert_vote("m2", first.id, -1).unwrap();

    let order = posts
        .query_by_member("m1")
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect::<Vec<_>>();
    assert_eq!(order, [third.id, second.id, first.id]);
}

#[test]
fn member_uids_with_separators_round_trip_through_keys() {
    let store = SqliteStore::open_in_memory().unwrap();
    let uid = "google::oauth/123";
    seeded(&store, &[uid]);
    let post = PostRepository::new(&store).insert(uid, "{}").unwrap();

    let (_, vote) = VoteRepository::new(&store)
        .insert_vote(uid, post.id, 1)
        .unwrap();
    assert_eq!(vote.member_uid, uid);

    let found = VoteRepository::new(&store)
        .query_member_votes_for(uid, &[post.id])
        .unwrap();
    assert_eq!(found, [vote]);
}

#[test]
fn data_survives_reopening_the_database_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.sqlite3");

    let post_id = {
        let store = SqliteStore::open(&path).unwrap();
        seeded(&store, &["m1"]);
        let post = PostRepository::new(&store).insert("m1", "{}").unwrap();
        VoteRepository::new(&store)
            .insert_vote("m1", post.id, -1)
            .unwrap();
        post.id
    };

    let store = SqliteStore::open(&path).unwrap();
    let post = PostRepository::new(&store).get(post_id).unwrap();
    assert_eq!(post.votes_total, -1);
    assert_eq!(
        MemberRepository::new(&store)
            .query_all()
            .unwrap()
            .len(),
        1
    );

    let next = PostRepository::new(&store).insert("m1", "{}").unwrap();
    assert_eq!(next.id, post_id + 1);

    let conn = open_db(&path).unwrap();
    assert_eq!(current_user_version(&conn).unwrap(), latest_version());
}

#[test]
fn missing_post_is_not_found() {
    let store = SqliteStore::open_in_memory().unwrap();
    let err = PostRepository::new(&store).get(7).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::Post,
            ..
        }
    ));
}
