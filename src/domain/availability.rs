//! Free/taken slot computation for a single venue and date.

use serde::Serialize;

use super::schedule::TimeRange;
use crate::error::{AppError, Result};

/// Free sub-intervals of `operating` not covered by any of `booked`, in order.
///
/// `booked` may be unsorted, overlapping or extend past operating hours.
pub fn free_slots(operating: TimeRange, booked: &[TimeRange]) -> Vec<TimeRange> {
    let mut taken: Vec<TimeRange> = booked
        .iter()
        .filter_map(|range| range.intersection(&operating))
        .collect();
    taken.sort();

    let mut free = Vec::new();
    let mut cursor = operating.start;
    for range in taken {
        if range.start > cursor {
            free.push(TimeRange {
                start: cursor,
                end: range.start,
            });
        }
        cursor = cursor.max(range.end);
    }
    if cursor < operating.end {
        free.push(TimeRange {
            start: cursor,
            end: operating.end,
        });
    }
    free
}

/// Reject `requested` if it intersects any of `booked`.
pub fn ensure_free(requested: &TimeRange, booked: &[TimeRange]) -> Result<()> {
    match booked.iter().find(|existing| existing.overlaps(requested)) {
        Some(existing) => Err(AppError::SlotConflict(format!(
            "{} overlaps existing booking {}",
            requested, existing
        ))),
        None => Ok(()),
    }
}

/// Reject `requested` if it falls outside operating hours.
pub fn ensure_within_hours(requested: &TimeRange, operating: &TimeRange) -> Result<()> {
    if operating.contains(requested) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} is outside operating hours {}",
            requested, operating
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayAvailability {
    pub open: TimeRange,
    pub free: Vec<TimeRange>,
    pub booked: Vec<TimeRange>,
}

impl DayAvailability {
    pub fn compute(operating: TimeRange, mut booked: Vec<TimeRange>) -> Self {
        booked.sort();
        let free = free_slots(operating, &booked);
        Self {
            open: operating,
            free,
            booked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::TimeOfDay;

    fn r(start: &str, end: &str) -> TimeRange {
        TimeRange::parse(start, end).unwrap()
    }

    #[test]
    fn test_no_bookings_whole_day_free() {
        let open = r("08:00", "22:00");
        assert_eq!(free_slots(open, &[]), vec![open]);
    }

    #[test]
    fn test_gaps_between_bookings() {
        let open = r("08:00", "22:00");
        let booked = [r("18:00", "20:00"), r("10:00", "11:00")];
        assert_eq!(
            free_slots(open, &booked),
            vec![r("08:00", "10:00"), r("11:00", "18:00"), r("20:00", "22:00")]
        );
    }

    #[test]
    fn test_overlapping_and_clipped_bookings() {
        let open = r("08:00", "22:00");
        let booked = [r("06:00", "09:00"), r("12:00", "14:00"), r("13:00", "15:00"), r("21:00", "24:00")];
        assert_eq!(
            free_slots(open, &booked),
            vec![r("09:00", "12:00"), r("15:00", "21:00")]
        );
    }

    #[test]
    fn test_fully_booked() {
        let open = r("08:00", "10:00");
        assert!(free_slots(open, &[r("08:00", "09:00"), r("09:00", "10:00")]).is_empty());
    }

    #[test]
    fn test_free_is_operating_minus_union() {
        // Exhaustive check at 30-minute granularity over a small day.
        let open = r("08:00", "12:00");
        let grid: Vec<TimeOfDay> = (14..=26).map(|half| TimeOfDay::from_minutes(half * 30).unwrap()).collect();
        let mut candidates = Vec::new();
        for (i, start) in grid.iter().enumerate() {
            for end in &grid[i + 1..] {
                candidates.push(TimeRange { start: *start, end: *end });
            }
        }

        for a in &candidates {
            for b in candidates.iter().step_by(7) {
                let booked = [*a, *b];
                let free = free_slots(open, &booked);
                for minute in (open.start.minutes()..open.end.minutes()).step_by(15) {
                    let window = TimeRange {
                        start: TimeOfDay::from_minutes(minute).unwrap(),
                        end: TimeOfDay::from_minutes(minute + 15).unwrap(),
                    };
                    let is_booked = booked.iter().any(|x| x.overlaps(&window));
                    let is_free = free.iter().any(|x| x.contains(&window));
                    assert_ne!(is_booked, is_free, "window {} with booked {:?}", window, booked);
                }
                for pair in free.windows(2) {
                    assert!(pair[0].end < pair[1].start);
                }
            }
        }
    }

    #[test]
    fn test_ensure_free_detects_overlap() {
        let booked = [r("10:00", "11:00")];
        assert!(matches!(
            ensure_free(&r("10:30", "11:30"), &booked),
            Err(AppError::SlotConflict(_))
        ));
        assert!(ensure_free(&r("11:00", "12:00"), &booked).is_ok());
        assert!(ensure_free(&r("09:00", "10:00"), &booked).is_ok());
    }

    #[test]
    fn test_ensure_within_hours() {
        let open = r("08:00", "22:00");
        assert!(ensure_within_hours(&r("08:00", "09:00"), &open).is_ok());
        assert!(ensure_within_hours(&r("21:00", "22:00"), &open).is_ok());
        assert!(ensure_within_hours(&r("07:00", "09:00"), &open).is_err());
        assert!(ensure_within_hours(&r("21:00", "23:00"), &open).is_err());
    }
}
