use poise::serenity_prelude as serenity;
use serenity::gateway::ActivityData;
use std::sync::{Arc, Mutex};
use tokio::time::{interval, Duration};
use tracing::{debug, info};

/// The cycling list of presences shown by the bot, replaced wholesale by
/// the owner `status` command and consumed by the rotation task.
#[derive(Clone)]
pub struct StatusRotation {
    inner: Arc<Mutex<RotationState>>,
}

struct RotationState {
    activities: Vec<ActivityData>,
    position: usize,
}

impl Default for StatusRotation {
    fn default() -> Self {
        Self::new(vec![ActivityData::playing("/help")])
    }
}

impl StatusRotation {
    pub fn new(activities: Vec<ActivityData>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RotationState {
                activities,
                position: 0,
            })),
        }
    }

    pub fn replace(&self, activities: Vec<ActivityData>) {
        let mut state = self.inner.lock().unwrap();
        state.activities = activities;
        state.position = 0;
    }

    /// The next activity in the cycle, None when the list is empty.
    pub fn next(&self) -> Option<ActivityData> {
        let mut state = self.inner.lock().unwrap();
        if state.activities.is_empty() {
            return None;
        }
        let activity = state.activities[state.position % state.activities.len()].clone();
        state.position = (state.position + 1) % state.activities.len();
        Some(activity)
    }
}

/// Background task cycling the bot presence.
pub async fn run(ctx: serenity::Context, rotation: StatusRotation, interval_secs: u64) {
    info!("Starting status rotation every {} seconds", interval_secs);
    let mut ticker = interval(Duration::from_secs(interval_secs));
    loop {
        ticker.tick().await;
        if let Some(activity) = rotation.next() {
            debug!("Rotating status to {:?}", activity.name);
            ctx.set_activity(Some(activity));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(rotation: &StatusRotation, n: usize) -> Vec<String> {
        (0..n)
            .filter_map(|_| rotation.next().map(|a| a.name))
            .collect()
    }

    #[test]
    fn test_rotation_cycles() {
        let rotation = StatusRotation::new(vec![
            ActivityData::playing("a"),
            ActivityData::playing("b"),
        ]);
        assert_eq!(names(&rotation, 3), ["a", "b", "a"]);
    }

    #[test]
    fn test_replace_restarts_the_cycle() {
        let rotation = StatusRotation::default();
        assert_eq!(names(&rotation, 1), ["/help"]);

        rotation.replace(vec![ActivityData::playing("new")]);
        assert_eq!(names(&rotation, 2), ["new", "new"]);
    }

    #[test]
    fn test_empty_rotation_yields_nothing() {
        let rotation = StatusRotation::new(Vec::new());
        assert!(rotation.next().is_none());
    }
}
