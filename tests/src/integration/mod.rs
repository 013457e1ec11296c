//! Cross-crate integration tests.

pub mod fleet_flows;
pub mod properties;

#[cfg(test)]
pub(crate) mod support {
    use lift_bus::Subscription;
    use lift_types::{LiftConfig, LiftEvent};
    use std::time::Duration;
    use tokio::time::timeout;

    /// Fast lift over a tall shaft: a floor per millisecond, no door dwell.
    pub fn fast_lift() -> LiftConfig {
        LiftConfig {
            lowest_floor: 0,
            highest_floor: 100,
            current_floor: 0,
            floors_per_second: 1000,
            door_close_wait_ms: 0,
        }
    }

    pub async fn recv(sub: &mut Subscription<LiftEvent>) -> anyhow::Result<LiftEvent> {
        timeout(Duration::from_secs(5), sub.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("subscription closed"))
    }

    /// Receive until `count` events match `done`, returning everything seen.
    pub async fn recv_until(
        sub: &mut Subscription<LiftEvent>,
        count: usize,
        done: impl Fn(&LiftEvent) -> bool,
    ) -> anyhow::Result<Vec<LiftEvent>> {
        let mut events = Vec::new();
        let mut matched = 0;
        while matched < count {
            let event = recv(sub).await?;
            if done(&event) {
                matched += 1;
            }
            events.push(event);
        }
        Ok(events)
    }
}
