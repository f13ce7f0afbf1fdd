//! Per-channel anti-spam state for the Alert Engine (spec §4.4).
use crate::constants::{
    IN_APP_DIGEST_THRESHOLD, IN_APP_DIGEST_WINDOW_SECS, PUSH_GLOBAL_MAX_PER_HOUR,
    PUSH_PER_AGENT_MAX_PER_HOUR, PUSH_THROTTLE_MAX_PER_AGENT, PUSH_THROTTLE_WINDOW_MS,
};
use std::collections::HashMap;
use std::sync::Mutex;

struct Bucket {
    window_start_ms: i64,
    count: u32,
}

impl Bucket {
    fn fresh(now_ms: i64) -> Self {
        Self {
            window_start_ms: now_ms,
            count: 0,
        }
    }
}

/// Global max 10/hour AND per-agent max 3/hour for the `push` channel
/// (spec §4.4 "Anti-spam"); also backs `shouldSendMessage` (spec §4.6.9),
/// whose 1-hour/3-per-agent rule is the same shape.
pub struct PushThrottle {
    global: Mutex<Bucket>,
    per_agent: Mutex<HashMap<String, Bucket>>,
}

impl PushThrottle {
    pub fn new(now_ms: i64) -> Self {
        Self {
            global: Mutex::new(Bucket::fresh(now_ms)),
            per_agent: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true and records the send if both the global and per-agent
    /// hourly caps allow it.
    pub fn try_send(&self, agent_id: &str, now_ms: i64) -> bool {
        let mut global = self.global.lock().unwrap();
        if now_ms - global.window_start_ms >= PUSH_THROTTLE_WINDOW_MS {
            *global = Bucket::fresh(now_ms);
        }
        if global.count >= PUSH_GLOBAL_MAX_PER_HOUR {
            return false;
        }

        let mut per_agent = self.per_agent.lock().unwrap();
        let bucket = per_agent
            .entry(agent_id.to_string())
            .or_insert_with(|| Bucket::fresh(now_ms));
        if now_ms - bucket.window_start_ms >= PUSH_THROTTLE_WINDOW_MS {
            *bucket = Bucket::fresh(now_ms);
        }
        if bucket.count >= PUSH_PER_AGENT_MAX_PER_HOUR {
            return false;
        }

        global.count += 1;
        bucket.count += 1;
        true
    }
}

/// `shouldSendMessage` (spec §4.6.9): always true for `in_app`; for `push`
/// a 1-hour / 3-per-agent window, independent of the Alert Engine's own
/// bucket above since it governs a different call site (cross-agent
/// coordination pushes, not rule deliveries).
pub struct CrossAgentPushThrottle {
    per_agent: Mutex<HashMap<String, Bucket>>,
}

impl CrossAgentPushThrottle {
    pub fn new() -> Self {
        Self {
            per_agent: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_send(&self, agent_id: &str, channel_is_push: bool, now_ms: i64) -> bool {
        if !channel_is_push {
            return true;
        }
        let mut per_agent = self.per_agent.lock().unwrap();
        let bucket = per_agent.entry(agent_id.to_string()).or_insert_with(|| {
            let mut b = Bucket::fresh(now_ms);
            b.count = 0;
            b
        });
        if now_ms - bucket.window_start_ms >= PUSH_THROTTLE_WINDOW_MS {
            *bucket = Bucket::fresh(now_ms);
        }
        if bucket.count >= PUSH_THROTTLE_MAX_PER_AGENT {
            return false;
        }
        bucket.count += 1;
        true
    }
}

impl Default for CrossAgentPushThrottle {
    fn default() -> Self {
        Self::new()
    }
}

struct DigestState {
    window_start_secs: i64,
    count: u32,
    digest_message_id: Option<u64>,
}

/// Rate-aware coalescing for `in_app`: more than 5 events for one agent
/// within 60 s merge into a single digest for the remainder of that
/// window (spec §4.4).
pub struct InAppDigest {
    per_agent: Mutex<HashMap<String, DigestState>>,
}

pub enum DigestDecision {
    DeliverNew,
    MergeInto(u64),
}

impl InAppDigest {
    pub fn new() -> Self {
        Self {
            per_agent: Mutex::new(HashMap::new()),
        }
    }

    pub fn decide(&self, agent_id: &str, now_secs: i64) -> DigestDecision {
        let mut per_agent = self.per_agent.lock().unwrap();
        let state = per_agent.entry(agent_id.to_string()).or_insert(DigestState {
            window_start_secs: now_secs,
            count: 0,
            digest_message_id: None,
        });
        if now_secs - state.window_start_secs >= IN_APP_DIGEST_WINDOW_SECS {
            *state = DigestState {
                window_start_secs: now_secs,
                count: 0,
                digest_message_id: None,
            };
        }
        state.count += 1;
        if state.count <= IN_APP_DIGEST_THRESHOLD {
            DigestDecision::DeliverNew
        } else if let Some(id) = state.digest_message_id {
            DigestDecision::MergeInto(id)
        } else {
            DigestDecision::DeliverNew
        }
    }

    pub fn record_digest_message(&self, agent_id: &str, message_id: u64) {
        if let Some(state) = self.per_agent.lock().unwrap().get_mut(agent_id) {
            state.digest_message_id = Some(message_id);
        }
    }
}

impl Default for InAppDigest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_throttle_enforces_per_agent_cap() {
        let throttle = PushThrottle::new(0);
        assert!(throttle.try_send("a1", 0));
        assert!(throttle.try_send("a1", 0));
        assert!(throttle.try_send("a1", 0));
        assert!(!throttle.try_send("a1", 0));
    }

    #[test]
    fn push_throttle_enforces_global_cap_across_agents() {
        let throttle = PushThrottle::new(0);
        let agents = ["a1", "a2", "a3", "a4"];
        let mut allowed = 0;
        for i in 0..12 {
            let agent = agents[i % agents.len()];
            if throttle.try_send(agent, 0) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, PUSH_GLOBAL_MAX_PER_HOUR as usize);
    }

    #[test]
    fn push_throttle_resets_after_window() {
        let throttle = PushThrottle::new(0);
        for _ in 0..PUSH_PER_AGENT_MAX_PER_HOUR {
            assert!(throttle.try_send("a1", 0));
        }
        assert!(!throttle.try_send("a1", 0));
        assert!(throttle.try_send("a1", PUSH_THROTTLE_WINDOW_MS));
    }

    #[test]
    fn digest_merges_after_threshold() {
        let digest = InAppDigest::new();
        for _ in 0..IN_APP_DIGEST_THRESHOLD {
            assert!(matches!(digest.decide("a1", 0), DigestDecision::DeliverNew));
        }
        match digest.decide("a1", 0) {
            DigestDecision::DeliverNew => {
                digest.record_digest_message("a1", 42);
            }
            DigestDecision::MergeInto(_) => panic!("first overflow should still create the digest"),
        }
        assert!(matches!(
            digest.decide("a1", 10),
            DigestDecision::MergeInto(42)
        ));
    }
}
