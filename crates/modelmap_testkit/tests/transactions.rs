//! Transaction guard behaviour against a full mapping.

use modelmap_core::{
    with_transaction, CoreError, CoreResult, Entity, OwnerContext, SessionlessContext,
};
use modelmap_testkit::prelude::*;
use std::sync::Arc;

fn add_note(session: &modelmap_core::Session, text: &str) -> CoreResult<()> {
    session.transaction(|| session.add(Arc::new(Note::new(text))))
}

#[test]
fn helpers_nest_into_one_commit() {
    let test = TestMapping::lenient();
    let ctx = test.begin_owner(&OwnerContext::new(), "req-1");
    let session = test.session(&ctx);

    let result: CoreResult<()> = session.transaction(|| {
        add_note(&session, "first")?;
        add_note(&session, "second")?;
        assert!(session.in_transaction());
        assert_eq!(test.engine().record_count(), 0);
        Ok(())
    });

    result.unwrap();
    assert_eq!(test.engine().committed_seq().as_u64(), 1);
    assert_eq!(test.engine().record_count(), 2);
}

#[test]
fn failing_helper_discards_the_outer_work() {
    let test = TestMapping::lenient();
    let session = test.new_session();

    let result: CoreResult<()> = session.transaction(|| {
        add_note(&session, "kept only if everything succeeds")?;
        session.transaction(|| Err(CoreError::invalid_operation("helper failed")))
    });

    assert!(result.is_err());
    assert!(!session.in_transaction());
    assert_eq!(test.engine().record_count(), 0);
    session.close();
}

#[test]
fn guard_resolves_the_scoped_proxy() {
    let test = TestMapping::lenient();
    let ctx = test.begin_owner(&OwnerContext::new(), "req-2");
    let scoped = test.context(&ctx);

    let result: CoreResult<()> =
        with_transaction(&scoped, || scoped.get().add(Arc::new(Note::new("via proxy"))));

    result.unwrap();
    assert_eq!(test.engine().record_count(), 1);
    assert!(!scoped.get().in_transaction());
}

#[test]
fn sessionless_context_runs_without_transactions() {
    let ctx = SessionlessContext::new();
    let note = Note::new("offline");

    let result: CoreResult<()> = with_transaction(&ctx, || {
        ctx.add(Arc::new(note.clone()));
        ctx.flush();
        Ok(())
    });

    result.unwrap();
    assert_eq!(ctx.len(), 1);
    assert!(ctx.get(&note.key()).is_some());
}

#[test]
fn engine_failure_rolls_the_transaction_back() {
    let test = TestMapping::lenient();
    let session = test.new_session();
    test.backend().arm(Fault::RejectAppends);

    let result = add_note(&session, "lost");

    assert!(matches!(result, Err(CoreError::Storage(_))));
    assert!(!session.in_transaction());
    assert_eq!(test.engine().record_count(), 0);

    test.backend().disarm();
    add_note(&session, "kept").unwrap();
    assert_eq!(test.engine().record_count(), 1);
}

#[test]
fn updates_and_deletes_reach_the_engine() {
    let test = TestMapping::lenient();
    let session = test.new_session();
    let note = Note::new("draft");
    let key = note.key();

    session
        .transaction(|| session.add(Arc::new(note.clone())))
        .unwrap();

    let edited = Note {
        text: "final".to_string(),
        ..note.clone()
    };
    let result: CoreResult<()> = session.transaction(|| session.add(Arc::new(edited.clone())));
    result.unwrap();
    assert_eq!(test.engine().load_as::<Note>(&key).unwrap(), Some(edited.clone()));

    let result: CoreResult<()> = session.transaction(|| session.delete(Arc::new(edited)));
    result.unwrap();
    assert!(!test.engine().contains(&key));
}
