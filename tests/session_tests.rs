mod common;

use common::{Order, Person, assigned_session, session};
use memoorm::{Managed, PersistenceError, SqlExecutor, Status, Value};

#[test]
fn test_kent_beck_scenario() {
    let mut session = session();

    let kent = Managed::new(Person::new("Kent Beck", 64, "beck@example.com"));
    session.persist(&kent).unwrap();
    assert_eq!(kent.borrow().id, Some(1));

    let found = session.find::<Person>(1).unwrap();
    assert!(found.ptr_eq(&kent));
    assert_eq!(found.borrow().age, 64);

    found.borrow_mut().email = Some("k@b.com".into());
    let summary = session.flush().unwrap();
    assert_eq!(summary.updated, 1);

    let again = session.find::<Person>(1).unwrap();
    assert_eq!(again.borrow().email.as_deref(), Some("k@b.com"));
    let stored = session
        .executor_mut()
        .query("SELECT email FROM person WHERE id = 1;")
        .unwrap();
    assert_eq!(stored.scalar(), Value::Text("k@b.com".into()));

    session.remove(&again).unwrap();
    session.flush().unwrap();
    assert!(matches!(
        session.find::<Person>(1),
        Err(PersistenceError::NotFound(key)) if key.id() == 1
    ));
    assert_eq!(session.executor().row_count("person").unwrap(), 0);
}

#[test]
fn test_find_hits_the_identity_map() {
    let mut session = session();
    session
        .executor_mut()
        .execute("INSERT INTO person (id, nick_name, old, email) VALUES (7, 'Ward', 50, NULL);")
        .unwrap();

    let first = session.find::<Person>(7).unwrap();
    let selects = session.executor().stats().selects;
    let second = session.find::<Person>(7).unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(session.executor().stats().selects, selects);
    assert_eq!(first.borrow().name, "Ward");
    assert_eq!(first.borrow().email, None);
    assert_eq!(session.status_of::<Person>(7).unwrap(), Some(Status::Managed));
}

#[test]
fn test_find_missing_row_leaves_no_placeholder() {
    let mut session = session();
    assert!(matches!(session.find::<Person>(42), Err(PersistenceError::NotFound(_))));
    assert_eq!(session.status_of::<Person>(42).unwrap(), None);
    assert!(session.context().is_empty());
}

#[test]
fn test_ids_follow_max_plus_one() {
    let mut session = session();
    session
        .executor_mut()
        .execute("INSERT INTO person (id, nick_name, old, email) VALUES (10, 'Seed', 1, NULL);")
        .unwrap();

    let a = Managed::new(Person::new("A", 1, "a@x"));
    let b = Managed::new(Person::new("B", 2, "b@x"));
    session.persist(&a).unwrap();
    session.persist(&b).unwrap();
    assert_eq!(a.borrow().id, Some(11));
    assert_eq!(b.borrow().id, Some(12));
}

#[test]
fn test_persist_is_idempotent_for_tracked_identity() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    session.persist(&kent).unwrap();

    assert_eq!(session.executor().stats().inserts, 1);
    assert_eq!(session.context().len(), 1);
}

#[test]
fn test_dirty_detection_tracks_reverts() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();

    kent.borrow_mut().age = 65;
    let dirty = session.context().collect_dirty().unwrap();
    assert_eq!(dirty.len(), 1);
    assert!(dirty[0].properties().contains("age"));

    kent.borrow_mut().age = 64;
    assert!(session.context().collect_dirty().unwrap().is_empty());
    assert_eq!(session.flush().unwrap().updated, 0);
}

#[test]
fn test_flush_twice_writes_once() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    kent.borrow_mut().name = "Kent Beck".into();

    session.flush().unwrap();
    let writes = session.executor().stats().writes();
    let second = session.flush().unwrap();

    assert_eq!(second.updated, 0);
    assert_eq!(session.executor().stats().writes(), writes);
}

#[test]
fn test_flush_updates_in_key_order() {
    let mut session = session();
    let people: Vec<_> = (0..3)
        .map(|i| Managed::new(Person::new(&format!("p{i}"), 20, "p@x")))
        .collect();
    for person in &people {
        session.persist(person).unwrap();
    }
    for person in people.iter().rev() {
        person.borrow_mut().age += 1;
    }
    session.executor_mut().reset_stats();

    session.flush().unwrap();
    let history = session.executor().history();
    assert_eq!(history.len(), 3);
    assert!(history[0].ends_with("WHERE id = 1;"));
    assert!(history[2].ends_with("WHERE id = 3;"));
}

#[test]
fn test_merge_untracked_inserts_once() {
    let mut session = session();
    let detached = Managed::new(Person::new("Erich", 60, "e@x"));

    let merged = session.merge(&detached).unwrap();
    assert!(merged.ptr_eq(&detached));
    let stats = session.executor().stats();
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.updates, 0);
    assert_eq!(session.status_of::<Person>(1).unwrap(), Some(Status::Managed));
}

#[test]
fn test_merge_tracked_copies_state_without_writing() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    session.executor_mut().reset_stats();

    let copy = Managed::new(Person::new("Kent Beck", 65, "kb@x").with_id(1));
    let merged = session.merge(&copy).unwrap();

    assert!(merged.ptr_eq(&kent));
    assert_eq!(kent.borrow().age, 65);
    assert_eq!(session.executor().stats().total(), 0);
    assert!(session.context().collect_dirty().unwrap().is_empty());
}

#[test]
fn test_merge_rejects_non_managed_records() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    session.remove(&kent).unwrap();

    let copy = Managed::new(Person::new("Kent", 1, "k@x").with_id(1));
    assert!(matches!(
        session.merge(&copy),
        Err(PersistenceError::InvalidLifecycleTransition { status: Status::Deleted, .. })
    ));
}

#[test]
fn test_remove_is_deferred_until_flush() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();

    session.remove(&kent).unwrap();
    assert_eq!(session.status_of::<Person>(1).unwrap(), Some(Status::Deleted));
    assert_eq!(session.executor().row_count("person").unwrap(), 1);
    assert!(matches!(session.find::<Person>(1), Err(PersistenceError::NotFound(_))));

    let summary = session.flush().unwrap();
    assert_eq!(summary.deleted, 1);
    assert_eq!(session.executor().row_count("person").unwrap(), 0);
    assert_eq!(session.status_of::<Person>(1).unwrap(), None);
}

#[test]
fn test_remove_guards() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));

    assert!(matches!(
        session.remove(&kent),
        Err(PersistenceError::IllegalManagedState(_))
    ));

    session.persist(&kent).unwrap();
    session.remove(&kent).unwrap();
    assert!(matches!(
        session.remove(&kent),
        Err(PersistenceError::InvalidLifecycleTransition { status: Status::Deleted, .. })
    ));

    session.flush().unwrap();
    session.executor_mut().reset_stats();
    assert!(matches!(
        session.remove(&kent),
        Err(PersistenceError::IllegalManagedState(_))
    ));
    assert_eq!(session.executor().stats().total(), 0);
}

#[test]
fn test_read_only_entities_are_never_flushed_or_removed() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    session.mark_read_only(&kent).unwrap();

    kent.borrow_mut().age = 99;
    assert_eq!(session.flush().unwrap().updated, 0);
    assert!(matches!(
        session.remove(&kent),
        Err(PersistenceError::InvalidLifecycleTransition { status: Status::ReadOnly, .. })
    ));
    assert!(session.find::<Person>(1).unwrap().ptr_eq(&kent));
}

#[test]
fn test_find_all_preserves_identity_map() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    session
        .executor_mut()
        .execute("INSERT INTO person (id, nick_name, old, email) VALUES (2, 'Ward', 50, NULL);")
        .unwrap();
    session
        .executor_mut()
        .execute("INSERT INTO person (id, nick_name, old, email) VALUES (3, 'Gone', 1, NULL);")
        .unwrap();
    let doomed = session.find::<Person>(3).unwrap();
    session.remove(&doomed).unwrap();

    let all = session.find_all::<Person>().unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].ptr_eq(&kent));
    assert_eq!(all[1].borrow().name, "Ward");
    assert!(session.find::<Person>(2).unwrap().ptr_eq(&all[1]));
}

#[test]
fn test_unregistered_kind_is_rejected() {
    let mut session = memoorm::Session::new(memoorm::MemoryDatabase::new());
    let order = Managed::new(Order { id: 1, total: 9.5, paid: false });
    assert!(matches!(
        session.persist(&order),
        Err(PersistenceError::InvalidEntityKind(_))
    ));
    assert!(matches!(
        session.find::<Order>(1),
        Err(PersistenceError::InvalidEntityKind(_))
    ));
    assert_eq!(session.executor().stats().total(), 0);
}

#[test]
fn test_assigned_identity_strategy() {
    let mut session = assigned_session();
    let with_id = Managed::new(Person::new("Grace", 85, "g@x").with_id(100));
    session.persist(&with_id).unwrap();
    assert_eq!(session.status_of::<Person>(100).unwrap(), Some(Status::Managed));

    let without = Managed::new(Person::new("Anon", 1, "a@x"));
    assert!(matches!(
        session.persist(&without),
        Err(PersistenceError::MissingIdentity { .. })
    ));
    assert_eq!(session.executor().stats().inserts, 1);
}

#[test]
fn test_float_and_bool_columns_round_trip() {
    let mut session = session();
    let order = Managed::new(Order { id: 0, total: 12.0, paid: false });
    session.persist(&order).unwrap();
    assert_eq!(order.borrow().id, 1);

    order.borrow_mut().paid = true;
    session.flush().unwrap();
    session.clear();

    let reloaded = session.find::<Order>(1).unwrap();
    assert!(!reloaded.ptr_eq(&order));
    assert_eq!(*reloaded.borrow(), Order { id: 1, total: 12.0, paid: true });
}

#[test]
fn test_tiny_float_change_is_dirty() {
    let mut session = session();
    let order = Managed::new(Order { id: 0, total: 0.0, paid: false });
    session.persist(&order).unwrap();

    order.borrow_mut().total = 1e-17;
    let dirty = session.context().collect_dirty().unwrap();
    assert_eq!(dirty.len(), 1);
    assert!(dirty[0].properties().contains("total"));
    assert_eq!(session.flush().unwrap().updated, 1);

    session.clear();
    assert_eq!(session.find::<Order>(1).unwrap().borrow().total, 1e-17);
}

#[test]
fn test_detach_and_close() {
    let mut session = session();
    let kent = Managed::new(Person::new("Kent", 64, "k@x"));
    session.persist(&kent).unwrap();
    assert!(session.contains(&kent).unwrap());

    assert!(session.detach(&kent).unwrap());
    assert!(!session.contains(&kent).unwrap());
    kent.borrow_mut().age = 1;
    assert_eq!(session.flush().unwrap().updated, 0);

    let reloaded = session.find::<Person>(1).unwrap();
    assert!(!reloaded.ptr_eq(&kent));
    assert_eq!(reloaded.borrow().age, 64);

    let db = session.close();
    assert_eq!(db.row_count("person").unwrap(), 1);
}
