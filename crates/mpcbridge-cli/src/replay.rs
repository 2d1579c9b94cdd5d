//! Planner stand-in: replays recorded solutions onto the event bus.
//!
//! The file format is JSON lines, one [`TrajectorySolution`] per line.
//! Blank lines and lines starting with `#` are skipped.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mpcbridge_middleware::{EventBus, Topic};
use mpcbridge_types::{Event, EventPayload, TrajectorySolution};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const SOURCE: &str = "mpcbridge-cli::replay";

/// Parse JSON-lines solutions; errors carry the 1-based line number.
pub fn parse_solutions(raw: &str) -> Result<Vec<TrajectorySolution>, String> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| format!("line {}: {e}", i + 1))
        })
        .collect()
}

pub fn load_solutions(path: &Path) -> Result<Vec<TrajectorySolution>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read solutions at {}: {e}", path.display()))?;
    let solutions = parse_solutions(&raw)?;
    if solutions.is_empty() {
        return Err(format!("{} contains no solutions", path.display()));
    }
    Ok(solutions)
}

/// Publish `solutions` on [`Topic::Solutions`], one per `period`, until the
/// list is exhausted (or forever when `looped`) or `shutdown` is set.
///
/// Returns the number of solutions published.
pub async fn replay(
    bus: EventBus,
    solutions: Vec<TrajectorySolution>,
    period: Duration,
    looped: bool,
    shutdown: Arc<AtomicBool>,
) -> usize {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut published = 0;

    'outer: loop {
        for solution in &solutions {
            interval.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                break 'outer;
            }
            let event = Event::new(SOURCE, EventPayload::Solution(solution.clone()));
            match bus.publish_to(Topic::Solutions, event) {
                Ok(receivers) => debug!(receivers, index = published, "solution published"),
                Err(e) => warn!(error = %e, "solution dropped"),
            }
            published += 1;
        }
        if !looped || solutions.is_empty() {
            break;
        }
    }
    info!(published, "replay finished");
    published
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_LINES: &str = r#"
# recorded with a 1-joint planner
{"joint_names":["knee"],"q":[0,0,0,0,0,0,1,0.1],"v":[0,0,0,0,0,0,0.2],"a":[0,0,0,0,0,0,0]}

{"joint_names":["knee"],"q":[0,0,0,0,0,0,1,0.2],"v":[0,0,0,0,0,0,0.2],"a":[0,0,0,0,0,0,0],"force_names":["foot"],"f":[{"x":0,"y":0,"z":9.81}]}
"#;

    #[test]
    fn parses_lines_and_skips_comments() {
        let solutions = parse_solutions(TWO_LINES).unwrap();
        assert_eq!(solutions.len(), 2);
        assert_eq!(solutions[0].q[7], 0.1);
        assert_eq!(solutions[1].f[0].z, 9.81);
    }

    #[test]
    fn parse_error_reports_line_number() {
        let err = parse_solutions("{\"joint_names\":[]}\n").unwrap_err();
        assert!(err.starts_with("line 1:"), "{err}");
    }

    #[test]
    fn empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        fs::write(&path, "# nothing\n").unwrap();
        assert!(load_solutions(&path).is_err());
    }

    #[tokio::test]
    async fn replay_publishes_every_solution_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Solutions);
        let solutions = parse_solutions(TWO_LINES).unwrap();

        let published = replay(
            bus.clone(),
            solutions,
            Duration::from_millis(1),
            false,
            Arc::new(AtomicBool::new(false)),
        )
        .await;
        assert_eq!(published, 2);

        for expected in [0.1, 0.2] {
            match rx.recv().await.unwrap().payload {
                EventPayload::Solution(s) => assert_eq!(s.q[7], expected),
                other => panic!("unexpected payload: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn replay_stops_on_shutdown() {
        let bus = EventBus::default();
        let solutions = parse_solutions(TWO_LINES).unwrap();
        let published = replay(
            bus,
            solutions,
            Duration::from_millis(1),
            true,
            Arc::new(AtomicBool::new(true)),
        )
        .await;
        assert_eq!(published, 0);
    }
}
