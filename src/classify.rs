//! Heartbeat status classification.
//!
//! Turns a reported UP/DOWN result into the stored status, applying the retry
//! (PENDING) ladder and upside-down inversion. Everything here is pure.

use crate::db::{Heartbeat, Status};

/// Outcome of classifying one reported result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub retries: u32,
}

impl Classification {
    fn new(status: Status, retries: u32) -> Self {
        Self { status, retries }
    }
}

/// The parts of the previous heartbeat that classification depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousBeat {
    pub status: Status,
    pub retries: u32,
}

impl From<&Heartbeat> for PreviousBeat {
    fn from(hb: &Heartbeat) -> Self {
        Self {
            status: hb.status,
            retries: hb.retries,
        }
    }
}

/// Decide the status and retry count for a newly reported result.
///
/// MAINTENANCE is never produced here; callers override the status for monitors
/// under maintenance without consulting the classifier.
pub fn classify(
    reported: Status,
    previous: Option<PreviousBeat>,
    max_retries: u32,
    upside_down: bool,
) -> Classification {
    let reported = if upside_down { reported.flipped() } else { reported };

    let Some(prev) = previous else {
        // First beat: give a failing monitor its retries before calling it DOWN.
        return if reported == Status::Down && max_retries > 0 {
            Classification::new(Status::Pending, 1)
        } else {
            Classification::new(reported, 0)
        };
    };

    let retries_left = max_retries > 0 && prev.retries < max_retries;

    match (prev.status, reported) {
        (Status::Up, Status::Down) if retries_left => {
            Classification::new(Status::Pending, prev.retries + 1)
        }
        (Status::Up, Status::Down) => Classification::new(Status::Down, 0),
        (Status::Pending, Status::Down) if retries_left => {
            Classification::new(Status::Pending, prev.retries + 1)
        }
        // Retries exhausted: a new down episode starts counting from zero.
        (Status::Pending, Status::Down) => Classification::new(Status::Down, 0),
        (_, Status::Down) => Classification::new(Status::Down, prev.retries + 1),
        (_, status) => Classification::new(status, 0),
    }
}

/// Whether a beat changes the monitor's notified state.
///
/// `last_important` is the status of the most recent important beat. PENDING is
/// transient and never becomes the notified state unless it is the first beat.
/// From such an initial PENDING only a DOWN is important: a monitor that
/// recovers before exhausting its retries was never reported down.
pub fn is_important_beat(is_first_beat: bool, last_important: Option<Status>, current: Status) -> bool {
    if is_first_beat {
        return true;
    }
    if current == Status::Pending {
        return false;
    }
    match last_important {
        Some(Status::Pending) => current == Status::Down,
        Some(last) => last != current,
        None => true,
    }
}

/// Whether an important beat should also reach the notification channels.
///
/// Entering maintenance and leaving it to UP are recorded but not announced.
pub fn is_important_for_notification(
    is_first_beat: bool,
    last_important: Option<Status>,
    current: Status,
) -> bool {
    if !is_important_beat(is_first_beat, last_important, current) {
        return false;
    }
    if current == Status::Maintenance {
        return false;
    }
    !(last_important == Some(Status::Maintenance) && current == Status::Up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::*;

    fn run_sequence(reported: &[Status], max_retries: u32, upside_down: bool) -> Vec<Classification> {
        let mut prev: Option<PreviousBeat> = None;
        reported
            .iter()
            .map(|&r| {
                let c = classify(r, prev, max_retries, upside_down);
                prev = Some(PreviousBeat {
                    status: c.status,
                    retries: c.retries,
                });
                c
            })
            .collect()
    }

    #[test]
    fn test_retry_ladder() {
        let out = run_sequence(&[Up, Down, Down, Down, Down], 2, false);
        assert_eq!(
            out,
            vec![
                Classification::new(Up, 0),
                Classification::new(Pending, 1),
                Classification::new(Pending, 2),
                Classification::new(Down, 0),
                Classification::new(Down, 1),
            ]
        );
    }

    #[test]
    fn test_recovery_resets_retries() {
        let out = run_sequence(&[Up, Down, Up, Down], 2, false);
        assert_eq!(out[1], Classification::new(Pending, 1));
        assert_eq!(out[2], Classification::new(Up, 0));
        assert_eq!(out[3], Classification::new(Pending, 1));
    }

    #[test]
    fn test_no_retries_goes_straight_down() {
        let out = run_sequence(&[Up, Down, Down, Up], 0, false);
        assert_eq!(
            out,
            vec![
                Classification::new(Up, 0),
                Classification::new(Down, 0),
                Classification::new(Down, 1),
                Classification::new(Up, 0),
            ]
        );
    }

    #[test]
    fn test_first_beat() {
        assert_eq!(classify(Down, None, 0, false), Classification::new(Down, 0));
        assert_eq!(classify(Down, None, 3, false), Classification::new(Pending, 1));
        assert_eq!(classify(Up, None, 3, false), Classification::new(Up, 0));
    }

    #[test]
    fn test_upside_down_mirrors_normal() {
        let normal = [Up, Down, Down, Down, Up, Down];
        let inverted: Vec<Status> = normal.iter().map(|s| s.flipped()).collect();
        for retries in 0..3 {
            assert_eq!(
                run_sequence(&normal, retries, false),
                run_sequence(&inverted, retries, true)
            );
        }
    }

    #[test]
    fn test_down_after_maintenance_counts_on() {
        let prev = PreviousBeat { status: Maintenance, retries: 0 };
        assert_eq!(classify(Down, Some(prev), 2, false), Classification::new(Down, 1));
        assert_eq!(classify(Up, Some(prev), 2, false), Classification::new(Up, 0));
    }

    #[test]
    fn test_important_beats() {
        assert!(is_important_beat(true, None, Pending));
        assert!(is_important_beat(false, Some(Up), Down));
        assert!(!is_important_beat(false, Some(Down), Down));
        assert!(!is_important_beat(false, Some(Up), Pending));
        assert!(!is_important_beat(false, Some(Up), Up));
        assert!(is_important_beat(false, Some(Down), Up));
        assert!(is_important_beat(false, Some(Up), Maintenance));
        assert!(is_important_beat(false, Some(Maintenance), Up));
        // initial PENDING
        assert!(!is_important_beat(false, Some(Pending), Up));
        assert!(!is_important_beat(false, Some(Pending), Maintenance));
        assert!(is_important_beat(false, Some(Pending), Down));
    }

    #[test]
    fn test_two_downs_only_first_important() {
        // UP (important), DOWN, DOWN with no retries configured.
        let mut last_important = Some(Up);
        let mut flags = Vec::new();
        for status in [Down, Down] {
            let important = is_important_beat(false, last_important, status);
            if important {
                last_important = Some(status);
            }
            flags.push(important);
        }
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_maintenance_transitions_not_notified() {
        assert!(!is_important_for_notification(false, Some(Up), Maintenance));
        assert!(!is_important_for_notification(false, Some(Maintenance), Up));
        assert!(is_important_for_notification(false, Some(Maintenance), Down));
        assert!(is_important_for_notification(false, Some(Up), Down));
        assert!(is_important_for_notification(true, None, Up));
    }
}
