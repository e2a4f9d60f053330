use toybox_core::{
    BusinessRuleViolation, EntityKind, ErrorKind, MemberRepository, MemoryStore, PostRepository,
    RepoError, VoteRepository,
};

fn store_with_members(uids: &[&str]) -> MemoryStore {
    let store = MemoryStore::new();
    let members = MemberRepository::new(&store);
    for uid in uids {
        members.get_or_create(uid, true).unwrap();
    }
    store
}

#[test]
fn insert_assigns_sequential_ids_and_zero_counters() {
    let store = store_with_members(&["m1"]);
    let posts = PostRepository::new(&store);

    let first = posts.insert("m1", r#"{"content":"hello"}"#).unwrap();
    let second = posts.insert("m1", r#"{"content":"again"}"#).unwrap();
    assert_eq!((first.id, second.id), (1, 2));
    assert_eq!(first.member_uid, "m1");
    assert_eq!(first.version, 1);
    assert_eq!(
        (first.votes_up, first.votes_down, first.votes_total),
        (0, 0, 0)
    );
    assert!(!first.is_deleted);

    assert_eq!(posts.get(first.id).unwrap(), first);
}

#[test]
fn blank_author_is_rejected() {
    let store = MemoryStore::new();
    let posts = PostRepository::new(&store);

    let err = posts.insert("", "{}").unwrap_err();
    assert!(matches!(err, RepoError::InvalidField { ref name, .. } if name == "member_uid"));
    assert_eq!(store.count(EntityKind::Post).unwrap(), 0);
}

#[test]
fn insert_requires_existing_member() {
    let store = MemoryStore::new();
    let posts = PostRepository::new(&store);

    let err = posts.insert("ghost", "{}").unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::Member,
            ..
        }
    ));
    assert_eq!(store.count(EntityKind::Post).unwrap(), 0);
}

#[test]
fn insert_rejects_malformed_body_and_defaults_blank_body() {
    let store = store_with_members(&["m1"]);
    let posts = PostRepository::new(&store);

    let err = posts.insert("m1", "not json").unwrap_err();
    assert!(matches!(err, RepoError::InvalidField { ref name, .. } if name == "data"));
    assert_eq!(store.count(EntityKind::Post).unwrap(), 0);

    let post = posts.insert("m1", "   ").unwrap();
    assert_eq!(post.data, "{}");
}

#[test]
fn author_can_delete_and_deleted_posts_leave_lists() {
    let store = store_with_members(&["m1"]);
    let posts = PostRepository::new(&store);
    let kept = posts.insert("m1", "{}").unwrap();
    let removed = posts.insert("m1", "{}").unwrap();

    posts.mark_deleted("m1", removed.id).unwrap();

    let stored = posts.get(removed.id).unwrap();
    assert!(stored.is_deleted);
    assert_eq!(stored.version, removed.version + 1);

    let listed = posts
        .query_all()
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect::<Vec<_>>();
    assert_eq!(listed, [kept.id]);
    assert_eq!(posts.query_by_member("m1").unwrap().len(), 1);
}

#[test]
fn deleting_twice_is_a_no_op() {
    let store = store_with_members(&["m1"]);
    let posts = PostRepository::new(&store);
    let post = posts.insert("m1", "{}").unwrap();

    posts.mark_deleted("m1", post.id).unwrap();
    let after_first = posts.get(post.id).unwrap();
    posts.mark_deleted("m1", post.id).unwrap();

    assert_eq!(posts.get(post.id).unwrap(), after_first);
}

#[test]
fn non_author_delete_is_denied() {
    let store = store_with_members(&["m1", "m2"]);
    let posts = PostRepository::new(&store);
    let post = posts.insert("m1", "{}").unwrap();

    let err = posts.mark_deleted("m2", post.id).unwrap_err();
    assert!(matches!(
        err,
        RepoError::BusinessRule(BusinessRuleViolation::AccessDenied { .. })
    ));
    assert_eq!(err.code(), "AccessDeniedError");
    assert!(!posts.get(post.id).unwrap().is_deleted);
}

#[test]
fn deleting_unknown_post_is_not_found() {
    let store = store_with_members(&["m1"]);
    let posts = PostRepository::new(&store);

    let err = posts.mark_deleted("m1", 404).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn lists_order_by_total_with_insertion_ties() {
    let store = store_with_members(&["m1", "m2", "m3"]);
    let posts = PostRepository::new(&store);
    let votes = VoteRepository::new(&store);

    let low = posts.insert("m1", "{}").unwrap();
    let tie_a = posts.insert("m2", "{}").unwrap();
    let tie_b = posts.insert("m1", "{}").unwrap();
    let top = posts.insert("m2", "{}").unwrap();

    votes.insert_vote("m3", low.id, -1).unwrap();
    votes.insert_vote("m3", top.id, 1).unwrap();
    votes.insert_vote("m1", top.id, 1).unwrap();

    let order = posts
        .query_all()
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect::<Vec<_>>();
    assert_eq!(order, [top.id, tie_a.id, tie_b.id, low.id]);

    let mine = posts
        .query_by_member("m1")
        .unwrap()
        .into_iter()
        .map(|post| post.id)
        .collect::<Vec<_>>();
    assert_eq!(mine, [tie_b.id, low.id]);
}
