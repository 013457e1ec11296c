//! # Lift and Bus Guarantees
//!
//! Properties that must hold no matter how calls and subscriptions interleave:
//!
//! 1. Duplicate calls are absorbed without a second event
//! 2. A single trip produces its events in travel order
//! 3. Concurrent calls are each served exactly once
//! 4. Identities stay unique under concurrent registration
//! 5. Every subscriber of a topic sees the same order
//! 6. Out-of-range floors never enter a queue

#[cfg(test)]
mod tests {
    use super::super::support::{fast_lift, recv, recv_until};
    use lift_bus::MessageBus;
    use lift_engine::{FleetError, FleetManager};
    use lift_types::{LiftError, LiftEvent, LiftId, LiftMessage};
    use rand::seq::SliceRandom;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn is_arrival(event: &LiftEvent) -> bool {
        matches!(event, LiftEvent::LiftArrived { .. })
    }

    // =========================================================================
    // LIFT
    // =========================================================================

    #[tokio::test]
    async fn test_repeated_call_single_event() -> anyhow::Result<()> {
        lift_telemetry::init_test_logging();
        let fleet = FleetManager::new();
        let lift = fleet.add_lift(fast_lift())?;
        let mut sub = lift.subscribe()?;

        assert!(fleet.call_lift(lift.id(), 6));
        for _ in 0..5 {
            assert!(!fleet.call_lift(lift.id(), 6));
        }

        assert_eq!(
            recv(&mut sub).await?,
            LiftEvent::LiftCalled {
                lift_id: lift.id(),
                floor: 6
            }
        );
        assert_eq!(sub.try_recv(), Ok(None));
        assert_eq!(lift.pending(), vec![6]);
        Ok(())
    }

    #[tokio::test]
    async fn test_trip_order() -> anyhow::Result<()> {
        let fleet = FleetManager::new();
        let lift = fleet.add_lift(fast_lift())?;
        let id = lift.id();
        let mut sub = lift.subscribe()?;
        fleet.start_lift(id);

        fleet.call_lift(id, 2);
        let events = recv_until(&mut sub, 1, is_arrival).await?;
        assert_eq!(
            events,
            vec![
                LiftEvent::LiftCalled { lift_id: id, floor: 2 },
                LiftEvent::LiftTransited { lift_id: id, from: 0, to: 1 },
                LiftEvent::LiftTransited { lift_id: id, from: 1, to: 2 },
                LiftEvent::LiftArrived { lift_id: id, floor: 2 },
            ]
        );

        fleet.shutdown().await;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_each_served_once() -> anyhow::Result<()> {
        let fleet = Arc::new(FleetManager::new());
        let lift = fleet.add_lift(fast_lift())?;
        let id = lift.id();
        let mut sub = lift.subscribe()?;
        fleet.start_lift(id);

        let mut floors: Vec<i32> = (1..=20).collect();
        floors.shuffle(&mut rand::thread_rng());

        // Each floor requested by two racing callers.
        let mut callers = Vec::new();
        for &floor in floors.iter().chain(floors.iter()) {
            let fleet = Arc::clone(&fleet);
            callers.push(tokio::spawn(async move { fleet.call_lift(id, floor) }));
        }
        let mut accepted = 0;
        for caller in callers {
            if caller.await? {
                accepted += 1;
            }
        }
        // A floor already visited may be accepted a second time.
        assert!(accepted >= floors.len());

        let mut calls: HashMap<i32, usize> = HashMap::new();
        let mut arrivals: HashMap<i32, usize> = HashMap::new();
        while arrivals.values().sum::<usize>() < accepted {
            match recv(&mut sub).await? {
                LiftEvent::LiftCalled { floor, .. } => *calls.entry(floor).or_default() += 1,
                LiftEvent::LiftArrived { floor, .. } => *arrivals.entry(floor).or_default() += 1,
                _ => {}
            }
        }

        assert_eq!(arrivals, calls, "every accepted call is served exactly once");
        assert_eq!(
            arrivals.keys().copied().collect::<HashSet<_>>(),
            floors.iter().copied().collect::<HashSet<_>>()
        );

        fleet.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_out_of_range_rejected() -> anyhow::Result<()> {
        let fleet = FleetManager::new();
        let lift = fleet.add_lift(fast_lift())?;

        assert!(!fleet.call_lift(lift.id(), 101));
        assert!(!fleet.call_lift(lift.id(), -1));
        assert_eq!(
            fleet.try_call_lift(lift.id(), 500),
            Err(FleetError::Lift(LiftError::FloorOutOfRange {
                floor: 500,
                lowest: 0,
                highest: 100
            }))
        );
        assert!(lift.pending().is_empty());
        Ok(())
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_unique_ids_under_concurrent_add() -> anyhow::Result<()> {
        let fleet = Arc::new(FleetManager::new());

        let adders: Vec<_> = (0..64)
            .map(|_| {
                let fleet = Arc::clone(&fleet);
                tokio::spawn(async move { fleet.add_lift(fast_lift()).map(|lift| lift.id()) })
            })
            .collect();

        let mut ids = HashSet::new();
        for adder in adders {
            assert!(ids.insert(adder.await??));
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(fleet.state().len(), 64);
        assert_eq!(ids, (1..=64).map(LiftId).collect::<HashSet<_>>());
        Ok(())
    }

    // =========================================================================
    // BUS
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribers_agree_on_order() -> anyhow::Result<()> {
        let bus = MessageBus::<u32>::new();
        let topic = lift_bus::Topic::new("ordering");
        let subs: Vec<_> = (0..3)
            .map(|_| bus.subscribe(&topic))
            .collect::<Result<_, _>>()?;

        let publishers: Vec<_> = (0..4u32)
            .map(|p| {
                let bus = bus.clone();
                let topic = topic.clone();
                tokio::spawn(async move {
                    for i in 0..250 {
                        bus.publish(&topic, p * 1000 + i);
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.await?;
        }

        let mut sequences = Vec::new();
        for sub in subs {
            let seq: Vec<u32> = timeout(Duration::from_secs(5), sub.take(1000).collect()).await?;
            sequences.push(seq);
        }
        assert_eq!(sequences[0].len(), 1000);
        assert_eq!(sequences[0], sequences[1]);
        assert_eq!(sequences[1], sequences[2]);
        Ok(())
    }

    #[tokio::test]
    async fn test_wire_shape_of_lift_events() -> anyhow::Result<()> {
        let fleet = FleetManager::new();
        let lift = fleet.add_lift(fast_lift())?;
        let mut sub = lift.subscribe()?;
        lift.call(3);

        let message = LiftMessage::from_event(&recv(&mut sub).await?)?;
        let json: serde_json::Value = serde_json::from_str(&message.to_json()?)?;
        assert_eq!(
            json,
            serde_json::json!({
                "liftId": lift.id().get(),
                "type": "lift_called",
                "payload": { "liftId": lift.id().get(), "floor": 3 }
            })
        );
        Ok(())
    }
}
