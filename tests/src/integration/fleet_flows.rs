//! # Fleet Flows
//!
//! End-to-end flows through the manager and the aggregator, sharing one
//! repository the way a server would:
//!
//! ```text
//! FleetManager ──┐
//!                ├── LiftRepository ── lift:N / lifts topics
//! Aggregator ────┘
//! ```

#[cfg(test)]
mod tests {
    use super::super::support::{fast_lift, recv, recv_until};
    use lift_engine::{Aggregator, FleetError, FleetManager, LiftRepository};
    use lift_types::{LiftEvent, LiftId};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    /// Check one lift's events form valid trips: transits are consecutive
    /// single steps and every arrival is followed by its door cycle.
    fn assert_well_formed(events: &[LiftEvent]) {
        let mut floor: Option<i32> = None;
        // Calls may land at any point, including during a door cycle.
        let motion: Vec<&LiftEvent> = events
            .iter()
            .filter(|e| !matches!(e, LiftEvent::LiftCalled { .. }))
            .collect();
        for pair in motion.windows(2) {
            match (pair[0], pair[1]) {
                (LiftEvent::LiftArrived { floor: a, .. }, next) => assert_eq!(
                    next,
                    &LiftEvent::LiftDoorsOpened {
                        lift_id: next.lift_id(),
                        floor: *a
                    }
                ),
                (LiftEvent::LiftDoorsOpened { floor: a, .. }, next) => assert_eq!(
                    next,
                    &LiftEvent::LiftDoorsClosed {
                        lift_id: next.lift_id(),
                        floor: *a
                    }
                ),
                _ => {}
            }
        }
        for event in events {
            if let LiftEvent::LiftTransited { from, to, .. } = event {
                if let Some(at) = floor {
                    assert_eq!(*from, at, "transit must start where the last ended");
                }
                assert_eq!((to - from).abs(), 1);
                floor = Some(*to);
            }
        }
    }

    async fn next_sink(sink: &mut mpsc::Receiver<LiftEvent>) -> anyhow::Result<LiftEvent> {
        timeout(Duration::from_secs(5), sink.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("sink closed"))
    }

    // =========================================================================
    // FLEET MANAGER
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_in_preserves_per_lift_order() -> anyhow::Result<()> {
        let fleet = FleetManager::new();
        let lifts: Vec<_> = (0..3)
            .map(|_| fleet.add_lift(fast_lift()))
            .collect::<Result<_, _>>()?;
        fleet.start_all();

        let mut sub = fleet.subscribe()?;
        for (i, lift) in lifts.iter().enumerate() {
            let i = i as i32;
            fleet.call_lift(lift.id(), 4 + i);
            fleet.call_lift(lift.id(), 1 + i);
        }

        let events = recv_until(&mut sub, 6, |e| {
            matches!(e, LiftEvent::LiftDoorsClosed { .. })
        })
        .await?;

        let mut per_lift: BTreeMap<LiftId, Vec<LiftEvent>> = BTreeMap::new();
        for event in events {
            per_lift.entry(event.lift_id()).or_default().push(event);
        }
        assert_eq!(per_lift.len(), 3);

        for (i, lift) in lifts.iter().enumerate() {
            let i = i as i32;
            let seen = &per_lift[&lift.id()];
            assert_well_formed(seen);
            let arrivals: Vec<i32> = seen
                .iter()
                .filter_map(|e| match e {
                    LiftEvent::LiftArrived { floor, .. } => Some(*floor),
                    _ => None,
                })
                .collect();
            assert_eq!(arrivals, vec![4 + i, 1 + i]);
        }

        fleet.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_unsubscribed_view_goes_quiet() -> anyhow::Result<()> {
        let fleet = FleetManager::new();
        let lift = fleet.add_lift(fast_lift())?;
        fleet.start_lift(lift.id());

        let mut kept = fleet.subscribe()?;
        let mut dropped = fleet.subscribe()?;
        assert_eq!(fleet.open_subscriptions(), 2);

        assert!(fleet.unsubscribe(dropped.id()));
        fleet.call_lift(lift.id(), 3);

        recv_until(&mut kept, 1, |e| matches!(e, LiftEvent::LiftDoorsClosed { .. })).await?;
        assert_eq!(dropped.recv().await, None);
        assert_eq!(fleet.open_subscriptions(), 1);

        fleet.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() -> anyhow::Result<()> {
        let fleet = FleetManager::new();
        for _ in 0..3 {
            let lift = fleet.add_lift(fast_lift())?;
            lift.start();
            lift.call(80);
        }
        let mut sub = fleet.subscribe()?;

        timeout(Duration::from_secs(2), fleet.shutdown()).await?;

        assert!(fleet.repository().bus().is_closed());
        assert_eq!(fleet.repository().bus().subscription_count(), 0);
        assert_eq!(sub.recv().await, None);
        assert!(matches!(fleet.add_lift(fast_lift()), Err(FleetError::ShutDown)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_registration_and_views_never_deadlock() -> anyhow::Result<()> {
        let repo = Arc::new(LiftRepository::new());
        let fleet = Arc::new(FleetManager::with_repository(Arc::clone(&repo)));
        for _ in 0..3 {
            let lift = fleet.add_lift(fast_lift())?;
            lift.start();
            lift.call(50);
        }
        // Never drained.
        let _stalled = fleet.subscribe()?;

        let (sink_tx, mut sink) = mpsc::channel(16);
        let (err_tx, mut errors) = mpsc::unbounded_channel();
        let aggregator = Aggregator::start(Arc::clone(&repo), sink_tx, err_tx).await;
        let drain = tokio::spawn(async move {
            let mut seen = 0usize;
            while sink.recv().await.is_some() {
                seen += 1;
            }
            seen
        });

        let workers: Vec<_> = (0..50)
            .map(|i| {
                let fleet = Arc::clone(&fleet);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        let lift = fleet.add_lift(fast_lift())?;
                        lift.start();
                        lift.call(1 + i % 10);
                    } else {
                        let view = fleet.subscribe()?;
                        tokio::task::yield_now().await;
                        anyhow::ensure!(fleet.unsubscribe(view.id()), "view already gone");
                    }
                    anyhow::Ok(())
                })
            })
            .collect();

        timeout(Duration::from_secs(10), async {
            for worker in workers {
                worker.await??;
            }
            anyhow::Ok(())
        })
        .await??;

        assert_eq!(repo.len(), 28);
        assert_eq!(fleet.open_subscriptions(), 1);
        timeout(Duration::from_secs(1), async {
            while aggregator.bridged_lifts().len() < 28 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await?;
        assert!(errors.try_recv().is_err());

        timeout(Duration::from_secs(5), async {
            aggregator.shutdown().await;
            fleet.shutdown().await;
        })
        .await?;
        assert!(drain.await? >= 25, "every added lift reaches the sink");
        Ok(())
    }

    // =========================================================================
    // AGGREGATOR
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_aggregator_follows_membership() -> anyhow::Result<()> {
        let repo = Arc::new(LiftRepository::new());
        let fleet = FleetManager::with_repository(Arc::clone(&repo));
        let (sink_tx, mut sink) = mpsc::channel(1024);
        let (err_tx, mut errors) = mpsc::unbounded_channel();
        let aggregator = Aggregator::start(Arc::clone(&repo), sink_tx, err_tx).await;

        // Added after the aggregator started.
        let late = fleet.add_lift(fast_lift())?;
        match next_sink(&mut sink).await? {
            LiftEvent::LiftAdded { lift_id, snapshot } => {
                assert_eq!(lift_id, late.id());
                assert_eq!(snapshot.current_floor, 0);
            }
            other => anyhow::bail!("expected lift_added, got {other:?}"),
        }
        timeout(Duration::from_secs(1), async {
            while aggregator.bridged_lifts() != vec![late.id()] {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await?;

        fleet.start_lift(late.id());
        fleet.call_lift(late.id(), 2);
        let mut motion = Vec::new();
        loop {
            let event = next_sink(&mut sink).await?;
            let closed = matches!(event, LiftEvent::LiftDoorsClosed { .. });
            motion.push(event);
            if closed {
                break;
            }
        }
        assert_well_formed(&motion);
        assert!(motion.iter().all(|e| e.lift_id() == late.id()));
        assert!(motion.contains(&LiftEvent::LiftArrived {
            lift_id: late.id(),
            floor: 2
        }));

        // Deleted: reported once, then silent.
        assert!(fleet.delete_lift(late.id()));
        loop {
            let event = next_sink(&mut sink).await?;
            if event == (LiftEvent::LiftDeleted { lift_id: late.id() }) {
                break;
            }
        }
        late.call(7);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.try_recv().is_err(), "deleted lift still reaching the sink");
        assert!(aggregator.bridged_lifts().is_empty());
        assert!(errors.try_recv().is_err());

        aggregator.shutdown().await;
        fleet.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_aggregator_bridges_existing_without_added_event() -> anyhow::Result<()> {
        let repo = Arc::new(LiftRepository::new());
        let first = repo.add_lift(fast_lift())?;
        let second = repo.add_lift(fast_lift())?;

        let (sink_tx, mut sink) = mpsc::channel(64);
        let (err_tx, _errors) = mpsc::unbounded_channel();
        let aggregator = Aggregator::start(Arc::clone(&repo), sink_tx, err_tx).await;
        assert_eq!(aggregator.bridged_lifts(), vec![first.id(), second.id()]);

        second.call(9);
        first.call(8);
        let mut got = vec![next_sink(&mut sink).await?, next_sink(&mut sink).await?];
        got.sort_by_key(LiftEvent::lift_id);
        assert_eq!(
            got,
            vec![
                LiftEvent::LiftCalled {
                    lift_id: first.id(),
                    floor: 8
                },
                LiftEvent::LiftCalled {
                    lift_id: second.id(),
                    floor: 9
                },
            ]
        );

        aggregator.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_aggregator_stops_when_sink_dropped() -> anyhow::Result<()> {
        let repo = Arc::new(LiftRepository::new());
        let lift = repo.add_lift(fast_lift())?;
        let (sink_tx, sink) = mpsc::channel(1);
        let (err_tx, _errors) = mpsc::unbounded_channel();
        let aggregator = Aggregator::start(Arc::clone(&repo), sink_tx, err_tx).await;

        drop(sink);
        lift.call(3);
        lift.call(4);

        timeout(Duration::from_secs(2), aggregator.shutdown()).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_lifecycle_feed_seen_by_plain_subscriber() -> anyhow::Result<()> {
        let repo = LiftRepository::new();
        let mut feed = repo.subscribe_lifecycle()?;

        let lift = repo.add_lift(fast_lift())?;
        repo.delete_lift(lift.id());

        let kinds = vec![recv(&mut feed).await?, recv(&mut feed).await?]
            .iter()
            .map(LiftEvent::event_type)
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["lift_added", "lift_deleted"]);
        Ok(())
    }
}
