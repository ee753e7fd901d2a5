//! Health-based selection (the default algorithm).
//!
//! Score starts at 100:
//! - response time: -30 above 1000ms, else -15 above 500ms
//! - connections: -20 above 10, else -10 above 5
//! - -10 per failure ever recorded (survives recovery)
//! - +1 per success recorded
//!
//! The highest score wins; ties go to the first instance in registration order.

use std::sync::Arc;
use crate::load_balancer::{LoadBalancer, instance::Instance};

pub fn health_score(instance: &Instance) -> i64 {
    let mut score: i64 = 100;

    let avg = instance.avg_response_ms();
    if avg > 1000.0 {
        score -= 30;
    } else if avg > 500.0 {
        score -= 15;
    }

    let connections = instance.connections();
    if connections > 10 {
        score -= 20;
    } else if connections > 5 {
        score -= 10;
    }

    let failures = i64::try_from(instance.failure_count()).unwrap_or(i64::MAX);
    let successes = i64::try_from(instance.success_count()).unwrap_or(i64::MAX);
    score
        .saturating_sub(failures.saturating_mul(10))
        .saturating_add(successes)
}

#[derive(Debug, Default)]
pub struct HealthBased;

impl HealthBased {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for HealthBased {
    fn next_server(&self, instances: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        let mut best: Option<(i64, &Arc<Instance>)> = None;
        for instance in instances {
            let score = health_score(instance);
            match best {
                Some((top, _)) if score <= top => {}
                _ => best = Some((score, instance)),
            }
        }
        best.map(|(_, instance)| instance.clone())
    }

    fn name(&self) -> &'static str {
        "health_based"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::health::HealthPolicy;
    use crate::load_balancer::instance::tests::instance;
    use crate::load_balancer::instance::ConnectionGuard;

    fn hold(instance: &Arc<Instance>, n: usize) -> Vec<ConnectionGuard> {
        (0..n).map(|_| instance.acquire()).collect()
    }

    #[test]
    fn slow_instance_loses_to_fast_one() {
        // A: 1200ms avg, 2 connections -> 70. B: 300ms, 3 connections -> 100.
        let a = instance("A", 0);
        let b = instance("B", 1);
        a.record_request(Duration::from_millis(1200), false);
        b.record_request(Duration::from_millis(300), false);
        let _ga = hold(&a, 2);
        let _gb = hold(&b, 3);

        assert_eq!(health_score(&a), 70);
        assert_eq!(health_score(&b), 100);
        assert_eq!(HealthBased::new().next_server(&[a, b]).unwrap().id, "B");
    }

    #[test]
    fn connection_penalty_decides() {
        let busy = instance("busy", 0);
        let calm = instance("calm", 1);
        let _gb = hold(&busy, 11);
        let _gc = hold(&calm, 4);

        assert_eq!(health_score(&busy), 80);
        assert_eq!(health_score(&calm), 100);
        assert_eq!(HealthBased::new().next_server(&[busy, calm]).unwrap().id, "calm");
    }

    #[test]
    fn failure_history_and_successes_count() {
        let i = instance("i", 0);
        let policy = HealthPolicy { max_failures: 10, recovery_requests: 1 };
        i.record_probe(false, &policy);
        i.record_probe(false, &policy);
        i.record_probe(true, &policy);
        assert_eq!(health_score(&i), 100 - 20 + 1);
    }

    #[test]
    fn ties_go_to_first_encountered() {
        let instances = vec![instance("first", 0), instance("second", 1), instance("third", 2)];
        assert_eq!(HealthBased::new().next_server(&instances).unwrap().id, "first");
    }

    #[test]
    fn middle_penalties() {
        let i = instance("i", 0);
        i.record_request(Duration::from_millis(600), false);
        let _g = hold(&i, 6);
        assert_eq!(health_score(&i), 100 - 15 - 10);
    }
}
