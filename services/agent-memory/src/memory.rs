//! Agent memory aggregate and its merge law
//!
//! The same type is used for the local replica and the shared one kept by the
//! journal server. Two replicas that drifted apart while offline are combined
//! with [`merge`], which is associative and, on level and lesson sets,
//! commutative, so repeated partial syncs converge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum number of lessons kept per replica (origin anchor included)
pub const MAX_LESSONS: usize = 50;
/// XP threshold for the first level-up
pub const INITIAL_NEXT_LEVEL_XP: u64 = 100;
/// Fixed id of the seed lesson every replica starts with
pub const GENESIS_LESSON_ID: &str = "genesis";

/// One learned insight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub trend_context: String,
    pub insight: String,
}

/// Experience, level and lessons of the trading agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMemory {
    pub level: u32,
    pub current_xp: u64,
    pub next_level_xp: u64,
    pub brain_version: String,
    pub lessons: Vec<Lesson>,
    pub updated_at: DateTime<Utc>,
}

impl AgentMemory {
    /// Default seed. Deterministic so independently created replicas share
    /// the same origin lesson.
    pub fn seed() -> Self {
        Self {
            level: 1,
            current_xp: 0,
            next_level_xp: INITIAL_NEXT_LEVEL_XP,
            brain_version: brain_version(1),
            lessons: vec![Lesson {
                id: GENESIS_LESSON_ID.to_string(),
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                trend_context: "GENESIS".to_string(),
                insight: "Every closed trade is a lesson.".to_string(),
            }],
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Grant experience, levelling up as many times as the grant covers.
    ///
    /// Returns the number of levels gained.
    pub fn add_experience(&mut self, amount: u64) -> u32 {
        self.current_xp = self.current_xp.saturating_add(amount);
        let mut gained = 0;
        while self.current_xp >= self.next_level_xp {
            self.current_xp -= self.next_level_xp;
            self.level = self.level.saturating_add(1);
            self.next_level_xp = next_threshold(self.next_level_xp);
            gained += 1;
        }
        self.brain_version = brain_version(self.level);
        self.updated_at = Utc::now();
        gained
    }

    /// Append a lesson, evicting the oldest non-origin entries past the cap.
    pub fn add_lesson(&mut self, insight: &str, trend_context: &str) -> Lesson {
        let lesson = Lesson {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            trend_context: trend_context.to_string(),
            insight: insight.to_string(),
        };
        self.lessons.push(lesson.clone());
        trim_lessons(&mut self.lessons);
        self.updated_at = lesson.timestamp;
        lesson
    }

    /// Most recent lessons, newest last
    pub fn recent_lessons(&self, n: usize) -> &[Lesson] {
        let start = self.lessons.len().saturating_sub(n);
        &self.lessons[start..]
    }

    /// Repair values that would break the level-up loop or the derived
    /// version string. Applied to replicas received from the network.
    pub fn normalized(mut self) -> Self {
        self.level = self.level.max(1);
        self.next_level_xp = self.next_level_xp.max(1);
        self.brain_version = brain_version(self.level);
        trim_lessons(&mut self.lessons);
        self
    }
}

impl Default for AgentMemory {
    fn default() -> Self {
        Self::seed()
    }
}

/// Version string derived from the level: `v{level/10 + 1}.{level % 10}`
pub fn brain_version(level: u32) -> String {
    format!("v{}.{}", level / 10 + 1, level % 10)
}

// floor(current * 1.5), never below current + 1 so the loop always terminates
fn next_threshold(current: u64) -> u64 {
    (current.saturating_mul(3) / 2).max(current.saturating_add(1))
}

/// Keep element 0 plus the most recent `MAX_LESSONS - 1` entries.
pub fn trim_lessons(lessons: &mut Vec<Lesson>) {
    if lessons.len() > MAX_LESSONS {
        let tail_start = lessons.len() - (MAX_LESSONS - 1);
        lessons.drain(1..tail_start);
    }
}

/// Merge two replicas.
///
/// The higher level wins the whole XP triple; on equal levels `a` wins. That
/// tie-break makes the result deterministic but not symmetric when both
/// sides levelled to the same point with different XP.
pub fn merge(a: &AgentMemory, b: &AgentMemory) -> AgentMemory {
    let progress = if b.level > a.level { b } else { a };

    let mut by_id: HashMap<&str, &Lesson> = HashMap::with_capacity(a.lessons.len() + b.lessons.len());
    for lesson in a.lessons.iter().chain(b.lessons.iter()) {
        by_id.insert(lesson.id.as_str(), lesson);
    }
    let mut lessons: Vec<Lesson> = by_id.into_values().cloned().collect();
    lessons.sort_by(|x, y| x.timestamp.cmp(&y.timestamp).then_with(|| x.id.cmp(&y.id)));
    trim_lessons(&mut lessons);

    AgentMemory {
        level: progress.level,
        current_xp: progress.current_xp,
        next_level_xp: progress.next_level_xp,
        brain_version: brain_version(progress.level),
        lessons,
        updated_at: a.updated_at.max(b.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashSet;

    fn lesson(id: &str, secs: i64) -> Lesson {
        Lesson {
            id: id.to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs),
            trend_context: "RANGING".to_string(),
            insight: format!("insight {}", id),
        }
    }

    fn replica(level: u32, xp: u64, ids: &[(&str, i64)]) -> AgentMemory {
        let mut m = AgentMemory::seed();
        m.level = level;
        m.current_xp = xp;
        m.brain_version = brain_version(level);
        m.lessons.extend(ids.iter().map(|(id, ts)| lesson(id, *ts)));
        m
    }

    fn ids(m: &AgentMemory) -> HashSet<String> {
        m.lessons.iter().map(|l| l.id.clone()).collect()
    }

    #[test]
    fn test_seed_values() {
        let m = AgentMemory::seed();
        assert_eq!(m.level, 1);
        assert_eq!(m.current_xp, 0);
        assert_eq!(m.next_level_xp, 100);
        assert_eq!(m.brain_version, "v1.1");
        assert_eq!(m.lessons.len(), 1);
        assert_eq!(m.lessons[0].id, GENESIS_LESSON_ID);
        assert_eq!(AgentMemory::seed(), AgentMemory::seed());
    }

    #[test]
    fn test_brain_version_formula() {
        assert_eq!(brain_version(1), "v1.1");
        assert_eq!(brain_version(9), "v1.9");
        assert_eq!(brain_version(10), "v2.0");
        assert_eq!(brain_version(23), "v3.3");
    }

    #[test]
    fn test_single_level_up_carries_remainder() {
        let mut m = AgentMemory::seed();
        let gained = m.add_experience(130);
        assert_eq!(gained, 1);
        assert_eq!(m.level, 2);
        assert_eq!(m.current_xp, 30);
        assert_eq!(m.next_level_xp, 150);
        assert_eq!(m.brain_version, "v1.2");
    }

    #[test]
    fn test_large_grant_spans_multiple_levels() {
        // thresholds 100, 150, 225 -> 475 crosses all three
        let mut bulk = AgentMemory::seed();
        let gained = bulk.add_experience(480);
        assert_eq!(gained, 3);
        assert_eq!(bulk.level, 4);
        assert_eq!(bulk.current_xp, 5);
        assert_eq!(bulk.next_level_xp, 337);

        let mut stepped = AgentMemory::seed();
        stepped.add_experience(100);
        stepped.add_experience(150);
        stepped.add_experience(230);
        assert_eq!(stepped.level, bulk.level);
        assert_eq!(stepped.current_xp, bulk.current_xp);
        assert_eq!(stepped.next_level_xp, bulk.next_level_xp);
        assert_eq!(stepped.brain_version, bulk.brain_version);
    }

    #[test]
    fn test_zero_threshold_is_repaired() {
        let mut m = AgentMemory::seed();
        m.next_level_xp = 0;
        let mut m = m.normalized();
        assert_eq!(m.next_level_xp, 1);
        m.add_experience(10);
        assert!(m.level > 1);
    }

    #[test]
    fn test_lesson_cap_keeps_origin() {
        let mut m = AgentMemory::seed();
        for i in 0..80 {
            m.add_lesson(&format!("lesson {}", i), "TRENDING");
        }
        assert_eq!(m.lessons.len(), MAX_LESSONS);
        assert_eq!(m.lessons[0].id, GENESIS_LESSON_ID);
        assert_eq!(m.lessons[1].insight, "lesson 31");
        assert_eq!(m.lessons[MAX_LESSONS - 1].insight, "lesson 79");
    }

    #[test]
    fn test_merge_takes_higher_level_progress() {
        let a = replica(3, 40, &[("a1", 10)]);
        let mut b = replica(5, 7, &[("b1", 20)]);
        b.next_level_xp = 506;

        let c = merge(&a, &b);
        assert_eq!(c.level, 5);
        assert_eq!(c.current_xp, 7);
        assert_eq!(c.next_level_xp, 506);
        assert_eq!(c.brain_version, "v1.5");
        assert_eq!(ids(&c), ["genesis", "a1", "b1"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn test_merge_tie_prefers_calling_side() {
        let a = replica(4, 10, &[]);
        let b = replica(4, 90, &[]);
        assert_eq!(merge(&a, &b).current_xp, 10);
        assert_eq!(merge(&b, &a).current_xp, 90);
    }

    #[test]
    fn test_merge_commutative_on_level_and_lessons() {
        let a = replica(2, 5, &[("x", 5), ("shared", 7)]);
        let b = replica(6, 1, &[("y", 3), ("shared", 7)]);
        let ab = merge(&a, &b);
        let ba = merge(&b, &a);
        assert_eq!(ab.level, ba.level);
        assert_eq!(ids(&ab), ids(&ba));
        assert_eq!(ab.lessons, ba.lessons);
        assert_eq!(ab.lessons.len(), 4);
    }

    #[test]
    fn test_merge_idempotent() {
        let a = replica(2, 5, &[("x", 5)]);
        let b = replica(3, 1, &[("y", 3)]);
        let ab = merge(&a, &b);
        assert_eq!(merge(&a, &ab), ab);
        assert_eq!(merge(&ab, &ab), ab);
    }

    #[test]
    fn test_merge_associative() {
        let a = replica(2, 5, &[("a", 1)]);
        let b = replica(7, 3, &[("b", 2)]);
        let c = replica(4, 9, &[("c", 3)]);
        let left = merge(&merge(&a, &b), &c);
        let right = merge(&a, &merge(&b, &c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_merge_sorts_and_trims_union() {
        let a_ids: Vec<(String, i64)> = (0..40).map(|i| (format!("a{}", i), i * 2 + 10)).collect();
        let b_ids: Vec<(String, i64)> = (0..40).map(|i| (format!("b{}", i), i * 2 + 11)).collect();
        let a = replica(1, 0, &a_ids.iter().map(|(s, t)| (s.as_str(), *t)).collect::<Vec<_>>());
        let b = replica(1, 0, &b_ids.iter().map(|(s, t)| (s.as_str(), *t)).collect::<Vec<_>>());

        let c = merge(&a, &b);
        assert_eq!(c.lessons.len(), MAX_LESSONS);
        assert_eq!(c.lessons[0].id, GENESIS_LESSON_ID);
        assert!(c.lessons.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(c.lessons.last().map(|l| l.id.as_str()), Some("b39"));
    }
}
