//! Tests for admission decisions, overflow handling, and slot hand-off.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

fn scheduler(max_concurrent: usize, max_queue_size: usize, policy: OverflowPolicy) -> AdmissionScheduler {
    AdmissionScheduler::new(AdmissionConfig {
        max_concurrent,
        max_queue_size,
        overflow_policy: policy,
    })
}

fn req(priority: PriorityClass) -> AdmissionRequest {
    AdmissionRequest::new(priority, "test")
}

fn admitted(admission: Admission) -> ExecutionPermit {
    match admission {
        Admission::Admitted(permit) => permit,
        Admission::Queued(_) => panic!("expected immediate admission"),
    }
}

fn queued(admission: Admission) -> QueuedAdmission {
    match admission {
        Admission::Queued(ticket) => ticket,
        Admission::Admitted(_) => panic!("expected request to be queued"),
    }
}

#[tokio::test]
async fn admits_until_ceiling_then_queues() {
    let s = scheduler(2, 4, OverflowPolicy::DropLowestPriority);
    let _p1 = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let _p2 = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let _t = queued(s.submit(req(PriorityClass::Chat)).unwrap());

    assert_eq!(s.executing_count(), 2);
    assert_eq!(s.queue_len(), 1);
}

#[tokio::test]
async fn fairness_sequence_queues_emergency_and_rejects_trailing_chat() {
    // max_concurrent=3, max_queue_size=1, [chat, chat, chat, emergency, chat]
    let s = scheduler(3, 1, OverflowPolicy::DropLowestPriority);
    let _p1 = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let _p2 = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let _p3 = admitted(s.submit(req(PriorityClass::Chat)).unwrap());

    let emergency = queued(s.submit(req(PriorityClass::Emergency)).unwrap());
    assert_eq!(emergency.priority(), PriorityClass::Emergency);

    let last = s.submit(req(PriorityClass::Chat));
    assert!(matches!(
        last,
        Err(AdmissionError::Rejected { priority: PriorityClass::Chat })
    ));
    assert_eq!(s.executing_count(), 3);
    assert_eq!(s.queue_len(), 1);
}

#[tokio::test]
async fn emergency_evicts_queued_chat_when_queue_full() {
    let s = scheduler(3, 1, OverflowPolicy::DropLowestPriority);
    let _running: Vec<_> = (0..3)
        .map(|_| admitted(s.submit(req(PriorityClass::Chat)).unwrap()))
        .collect();
    let waiting_chat = queued(s.submit(req(PriorityClass::Chat)).unwrap());

    let emergency = queued(s.submit(req(PriorityClass::Emergency)).unwrap());

    assert_eq!(waiting_chat.wait().await.unwrap_err(), AdmissionError::OverflowDropped);
    assert_eq!(s.queue_len(), 1);

    let trailing = s.submit(req(PriorityClass::Chat));
    assert!(matches!(trailing, Err(AdmissionError::Rejected { .. })));

    drop(_running);
    let permit = emergency.wait().await.unwrap();
    assert_eq!(permit.priority(), PriorityClass::Emergency);
}

#[tokio::test]
async fn eviction_removes_exactly_one_entry() {
    let s = scheduler(1, 3, OverflowPolicy::DropLowestPriority);
    let _running = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let bg = queued(s.submit(req(PriorityClass::Background)).unwrap());
    let _chat1 = queued(s.submit(req(PriorityClass::Chat)).unwrap());
    let _chat2 = queued(s.submit(req(PriorityClass::Chat)).unwrap());

    let _medical = queued(s.submit(req(PriorityClass::Medical)).unwrap());

    assert_eq!(s.queue_len(), 3);
    assert_eq!(bg.wait().await.unwrap_err(), AdmissionError::OverflowDropped);
    assert_eq!(s.snapshot().stats.total_dropped, 1);
}

#[tokio::test]
async fn equal_priority_arrival_never_evicts() {
    let s = scheduler(1, 1, OverflowPolicy::DropLowestPriority);
    let _running = admitted(s.submit(req(PriorityClass::Legal)).unwrap());
    let _queued = queued(s.submit(req(PriorityClass::Legal)).unwrap());

    let result = s.submit(req(PriorityClass::Legal));
    assert!(matches!(result, Err(AdmissionError::Rejected { .. })));
}

#[tokio::test]
async fn equal_priority_dequeues_in_submission_order() {
    let s = scheduler(1, 10, OverflowPolicy::Reject);
    let first = admitted(s.submit(req(PriorityClass::Chat)).unwrap());

    let tickets: Vec<QueuedAdmission> = (0..4)
        .map(|_| queued(s.submit(req(PriorityClass::Chat)).unwrap()))
        .collect();
    let expected: Vec<Uuid> = tickets.iter().map(|t| t.id()).collect();

    drop(first);
    let mut order = Vec::new();
    for ticket in tickets {
        let permit = ticket.wait().await.unwrap();
        order.push(permit.id());
        drop(permit);
    }
    assert_eq!(order, expected);
}

#[tokio::test]
async fn higher_priority_dequeues_first() {
    let s = scheduler(1, 10, OverflowPolicy::Reject);
    let running = admitted(s.submit(req(PriorityClass::Background)).unwrap());
    let chat = queued(s.submit(req(PriorityClass::Chat)).unwrap());
    let medical = queued(s.submit(req(PriorityClass::Medical)).unwrap());

    drop(running);
    let permit = medical.wait().await.unwrap();
    assert_eq!(permit.priority(), PriorityClass::Medical);
    assert_eq!(s.queue_len(), 1);

    drop(permit);
    let permit = chat.wait().await.unwrap();
    assert_eq!(permit.priority(), PriorityClass::Chat);
}

#[tokio::test]
async fn executing_work_is_never_preempted() {
    let s = scheduler(1, 1, OverflowPolicy::DropLowestPriority);
    let running = admitted(s.submit(req(PriorityClass::Background)).unwrap());
    let _emergency = queued(s.submit(req(PriorityClass::Emergency)).unwrap());

    assert_eq!(s.executing_count(), 1);
    assert_eq!(s.snapshot().active[0].id, running.id());
}

#[tokio::test]
async fn reject_policy_rejects_even_higher_priority() {
    let s = scheduler(1, 1, OverflowPolicy::Reject);
    let _running = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let _queued = queued(s.submit(req(PriorityClass::Chat)).unwrap());

    let result = s.submit(req(PriorityClass::Emergency));
    assert!(matches!(
        result,
        Err(AdmissionError::Rejected { priority: PriorityClass::Emergency })
    ));
}

#[tokio::test]
async fn drop_oldest_policy_evicts_oldest_regardless_of_priority() {
    let s = scheduler(1, 2, OverflowPolicy::DropOldest);
    let _running = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let oldest = queued(s.submit(req(PriorityClass::Medical)).unwrap());
    let _newer = queued(s.submit(req(PriorityClass::Chat)).unwrap());

    let _arrival = queued(s.submit(req(PriorityClass::Background)).unwrap());
    assert_eq!(oldest.wait().await.unwrap_err(), AdmissionError::OverflowDropped);
    assert_eq!(s.queue_len(), 2);
}

#[tokio::test]
async fn zero_queue_rejects_once_busy() {
    let s = scheduler(1, 0, OverflowPolicy::DropOldest);
    let _running = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    assert!(s.submit(req(PriorityClass::Emergency)).is_err());
    assert_eq!(s.queue_len(), 0);
}

#[tokio::test]
async fn abandoned_waiter_is_skipped_on_release() {
    let s = scheduler(1, 5, OverflowPolicy::Reject);
    let running = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let gone = queued(s.submit(req(PriorityClass::Emergency)).unwrap());
    let waiting = queued(s.submit(req(PriorityClass::Chat)).unwrap());
    let waiting_id = waiting.id();
    drop(gone);

    drop(running);
    let permit = waiting.wait().await.unwrap();
    assert_eq!(permit.id(), waiting_id);
    assert_eq!(s.executing_count(), 1);
    assert_eq!(s.snapshot().stats.total_abandoned, 1);
}

#[tokio::test]
async fn slot_returns_when_queue_empty() {
    let s = scheduler(2, 5, OverflowPolicy::Reject);
    let p = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    assert_eq!(s.executing_count(), 1);
    drop(p);
    assert_eq!(s.executing_count(), 0);
    assert!(s.snapshot().active.is_empty());
}

#[tokio::test]
async fn close_fails_queued_and_refuses_new_work() {
    let s = scheduler(1, 5, OverflowPolicy::Reject);
    let running = admitted(s.submit(req(PriorityClass::Chat)).unwrap());
    let waiting = queued(s.submit(req(PriorityClass::Chat)).unwrap());

    s.close();
    assert!(s.is_closed());
    assert_eq!(waiting.wait().await.unwrap_err(), AdmissionError::ShuttingDown);
    assert!(matches!(
        s.submit(req(PriorityClass::Emergency)),
        Err(AdmissionError::ShuttingDown)
    ));

    drop(running);
    assert_eq!(s.executing_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submissions_never_exceed_ceiling() {
    let s = scheduler(3, 200, OverflowPolicy::Reject);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..60 {
        let s = s.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            let priority = PriorityClass::ALL[i % PriorityClass::ALL.len()];
            let permit = s.acquire(req(priority)).await.unwrap();
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            assert!(s.executing_count() <= 3);
            tokio::time::sleep(Duration::from_millis(2)).await;
            running.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(s.executing_count(), 0);
    assert_eq!(s.queue_len(), 0);
    assert_eq!(s.snapshot().stats.total_admitted, 60);
}
