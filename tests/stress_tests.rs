// Capacity and slot-reuse tests

use fdevent::core::event::poller::Backend;
use fdevent::core::event::{BackendPreference, EventList, Events, Trigger};
use fdevent::EventError;

mod common;
use common::{close_all, every_backend, pipe_pair, record, write_all, TestList};

#[test]
fn test_capacity_plus_one_registration_fails() {
    let capacity = 32;
    let mut list: TestList = EventList::new(capacity, BackendPreference::Auto).unwrap();

    for fd in 0..capacity as i32 {
        list.register(fd, record, fd as usize).unwrap();
    }
    let result = list.register(capacity as i32, record, 0);
    assert!(matches!(result, Err(EventError::OutOfRange { .. })));

    assert_eq!(list.registered(), capacity);
    for fd in 0..capacity as i32 {
        let (_, ctx) = list.lookup(fd).unwrap();
        assert_eq!(ctx, fd as usize);
    }
}

#[test]
fn test_many_pipes_all_reported() {
    for mut list in every_backend(512) {
        let pipes: Vec<_> = (0..20).map(|_| pipe_pair()).collect();
        let mut triggers: Vec<Option<Trigger>> = Vec::new();

        for &(r, _) in &pipes {
            list.register(r, record, r as usize).unwrap();
            let mut trigger = None;
            list.event_set(&mut trigger, r, Events::IN).unwrap();
            triggers.push(trigger);
        }
        for &(_, w) in pipes.iter().step_by(2) {
            write_all(w, b"!");
        }

        assert_eq!(list.poll(1000).unwrap(), 10, "{}", list.backend_kind());
        let mut ready: Vec<_> = list.ready().map(|(fd, _)| fd).collect();
        ready.sort_unstable();
        let mut expected: Vec<_> = pipes.iter().step_by(2).map(|&(r, _)| r).collect();
        expected.sort_unstable();
        assert_eq!(ready, expected, "{}", list.backend_kind());

        for (trigger, &(r, w)) in triggers.iter_mut().zip(&pipes) {
            list.event_del(trigger, r).unwrap();
            list.unregister(r).unwrap();
            close_all(&[r, w]);
        }
    }
}

#[test]
fn test_poll_backend_reuses_freed_slots() {
    let mut list: TestList = EventList::new(256, BackendPreference::Poll).unwrap();
    let pipes: Vec<_> = (0..8).map(|_| pipe_pair()).collect();
    let mut triggers: Vec<Option<Trigger>> = Vec::new();

    for &(r, _) in &pipes {
        list.register(r, record, 0).unwrap();
        let mut trigger = None;
        list.event_set(&mut trigger, r, Events::IN).unwrap();
        triggers.push(trigger);
    }

    let slots_of = |list: &TestList| {
        let poll = list.backend().as_poll().unwrap();
        (poll.slots(), poll.free_slots(), poll.allocated())
    };
    let (slots, free, allocated) = slots_of(&list);
    assert_eq!((slots, free), (8, 0));

    // churn one descriptor many times: array never grows
    let (r3, _) = pipes[3];
    let freed_index = triggers[3].as_ref().unwrap().index();
    for _ in 0..100 {
        list.event_del(&mut triggers[3], r3).unwrap();
        assert_eq!(slots_of(&list).1, 1);
        list.event_set(&mut triggers[3], r3, Events::IN).unwrap();
        assert_eq!(triggers[3].as_ref().unwrap().index(), freed_index);
    }
    assert_eq!(slots_of(&list), (slots, 0, allocated));

    for (trigger, &(r, w)) in triggers.iter_mut().zip(&pipes) {
        list.event_del(trigger, r).unwrap();
        close_all(&[r, w]);
    }
    assert_eq!(slots_of(&list).1, 8);
}

#[test]
fn test_probe_never_fails_on_unix() {
    let backend = Backend::probe(64).unwrap();
    assert!(!backend.name().is_empty());
}
