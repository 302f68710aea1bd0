//! Session ownership across requests, threads and tasks.

use modelmap_core::{OwnerContext, OwnerKey, Session};
use modelmap_testkit::prelude::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_requests_never_share_a_session() {
    let test = Arc::new(TestMapping::lenient());
    let barrier = Arc::new(Barrier::new(2));

    let workers: Vec<_> = ["req-a", "req-b"]
        .into_iter()
        .map(|request_id| {
            let test = Arc::clone(&test);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let ctx = test.begin_owner(&OwnerContext::new(), request_id);
                barrier.wait();
                test.session(&ctx)
            })
        })
        .collect();
    let sessions: Vec<Session> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    assert!(!sessions[0].ptr_eq(&sessions[1]));
    assert_eq!(test.registry().len(), 2);
}

#[test]
fn threads_without_requests_own_their_sessions() {
    let test = Arc::new(TestMapping::lenient());
    let root = OwnerContext::new();

    let mine = test.session(&root);
    let theirs = {
        let test = Arc::clone(&test);
        root.spawn(move |ctx| test.session(&ctx)).join().unwrap()
    };

    assert!(!mine.ptr_eq(&theirs));
    assert!(mine.ptr_eq(&test.session(&root)));
}

#[test]
fn request_context_follows_spawned_threads() {
    let test = Arc::new(TestMapping::lenient());
    let ctx = test.begin_owner(&OwnerContext::new(), "req-1");
    let here = test.session(&ctx);

    let there = {
        let test = Arc::clone(&test);
        ctx.spawn(move |inherited| test.session(&inherited))
            .join()
            .unwrap()
    };

    assert!(here.ptr_eq(&there));
}

#[test]
fn sibling_contexts_do_not_see_each_other() {
    let test = TestMapping::lenient();
    let root = OwnerContext::new();
    let first = test.begin_owner(&root, "req-1");
    let second = test.begin_owner(&root, "req-2");

    assert_eq!(root.request_id(), None);
    assert!(!test.session(&first).ptr_eq(&test.session(&second)));
    assert!(!test.session(&first).ptr_eq(&test.session(&root)));
}

#[test]
fn ended_owner_gets_a_fresh_session() {
    let test = TestMapping::lenient();
    let ctx = test.begin_owner(&OwnerContext::new(), "req-1");
    let before = test.session(&ctx);

    assert!(test.end_owner(&ctx));
    assert!(before.is_closed());

    let after = test.session(&ctx);
    assert!(!after.ptr_eq(&before));
    assert!(!after.is_closed());
}

#[test]
fn ending_an_idle_owner_is_a_no_op() {
    let test = TestMapping::lenient();
    let ctx = test.begin_owner(&OwnerContext::new(), "never-queried");

    assert!(!test.end_owner(&ctx));
    assert!(!test.evict(&OwnerKey::request("never-queried")));
    assert!(test.registry().is_empty());
}

#[test]
fn scoped_proxy_tracks_eviction() {
    let test = TestMapping::lenient();
    let ctx = test.begin_owner(&OwnerContext::new(), "req-1");
    let scoped = test.context(&ctx);

    let first = scoped.get();
    assert!(scoped.remove());
    let second = scoped.get();
    assert!(first.is_closed());
    assert!(!second.ptr_eq(&first));
}

#[tokio::test(flavor = "current_thread")]
async fn tasks_on_one_thread_are_separate_owners() {
    let test = Arc::new(TestMapping::lenient());
    let root = OwnerContext::new();

    let tasks: Vec<_> = ["task-1", "task-2"]
        .into_iter()
        .map(|request_id| {
            let test = Arc::clone(&test);
            let ctx = root.begin_owner(request_id);
            tokio::spawn(async move {
                let first = test.session(&ctx);
                tokio::task::yield_now().await;
                let again = test.session(&ctx);
                assert!(first.ptr_eq(&again));
                (thread::current().id(), first)
            })
        })
        .collect();

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(results[0].0, results[1].0);
    assert!(!results[0].1.ptr_eq(&results[1].1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_work_inherits_the_task_owner() {
    let test = Arc::new(TestMapping::lenient());
    let ctx = OwnerContext::new().begin_owner("req-async");
    let in_task = test.session(&ctx);

    let in_pool = {
        let test = Arc::clone(&test);
        let ctx = ctx.clone();
        tokio::task::spawn_blocking(move || test.session(&ctx))
            .await
            .unwrap()
    };

    assert!(in_task.ptr_eq(&in_pool));
    assert!(test.end_owner(&ctx));
}
