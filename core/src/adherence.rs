use crate::models::{AdherenceConfig, DailyIntake, DailyTarget, DayAdherence};

pub const PROTEIN_OK_RATIO: f64 = 0.90;
pub const WATER_OK_RATIO: f64 = 0.80;

/// Classify a day against its target.
///
/// A day is `Completed` when protein and calories are on target (and water,
/// if the user requires it), `Partial` when at least two of the three are,
/// and `Not` otherwise.
#[must_use]
pub fn evaluate_day(
    intake: &DailyIntake,
    target: &DailyTarget,
    config: &AdherenceConfig,
) -> DayAdherence {
    let protein_ok = intake.protein_g >= target.protein_g * PROTEIN_OK_RATIO;
    let kcal_ok = (intake.kcal - target.calories).abs() <= target.calories * config.kcal_window;
    let water_ok = intake.water_ml >= target.water_ml * WATER_OK_RATIO;

    if protein_ok && kcal_ok && (water_ok || !config.water_must_meet) {
        return DayAdherence::Completed;
    }
    let met = [protein_ok, kcal_ok, water_ok].iter().filter(|ok| **ok).count();
    if met >= 2 {
        DayAdherence::Partial
    } else {
        DayAdherence::Not
    }
}

/// Consecutive completed days, most recent first.
#[must_use]
pub fn calc_streak_from_records(completed: &[bool]) -> usize {
    completed.iter().take_while(|done| **done).count()
}

/// Consecutive days that keep the streak alive, most recent first. A `Not`
/// day always ends the streak; in strict mode a `Partial` day does too.
#[must_use]
pub fn calc_streak_from_statuses(days: &[DayAdherence], strict: bool) -> usize {
    days.iter()
        .take_while(|day| match day {
            DayAdherence::Completed => true,
            DayAdherence::Partial => !strict,
            DayAdherence::Not => false,
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> DailyTarget {
        DailyTarget {
            day_of_week: 0,
            calories: 2000.0,
            protein_g: 150.0,
            water_ml: 2500.0,
        }
    }

    fn intake(kcal: f64, protein_g: f64, water_ml: f64) -> DailyIntake {
        DailyIntake {
            kcal,
            protein_g,
            water_ml,
        }
    }

    #[test]
    fn test_completed_without_water() {
        let config = AdherenceConfig::default();
        let day = intake(1850.0, 140.0, 0.0);
        assert_eq!(evaluate_day(&day, &target(), &config), DayAdherence::Completed);
    }

    #[test]
    fn test_water_must_meet() {
        let config = AdherenceConfig {
            water_must_meet: true,
            ..AdherenceConfig::default()
        };
        let dry = intake(2000.0, 150.0, 1000.0);
        // Protein and kcal still make it partial.
        assert_eq!(evaluate_day(&dry, &target(), &config), DayAdherence::Partial);
        let wet = intake(2000.0, 150.0, 2000.0);
        assert_eq!(evaluate_day(&wet, &target(), &config), DayAdherence::Completed);
    }

    #[test]
    fn test_kcal_window_both_sides() {
        let config = AdherenceConfig::default();
        assert_eq!(
            evaluate_day(&intake(2200.0, 150.0, 0.0), &target(), &config),
            DayAdherence::Completed
        );
        assert_eq!(
            evaluate_day(&intake(2201.0, 150.0, 2500.0), &target(), &config),
            DayAdherence::Partial
        );
        assert_eq!(
            evaluate_day(&intake(1799.0, 150.0, 0.0), &target(), &config),
            DayAdherence::Not
        );

        let wide = AdherenceConfig {
            kcal_window: 0.25,
            ..AdherenceConfig::default()
        };
        assert_eq!(
            evaluate_day(&intake(1600.0, 150.0, 0.0), &target(), &wide),
            DayAdherence::Completed
        );
    }

    #[test]
    fn test_not_when_only_one_met() {
        let config = AdherenceConfig::default();
        assert_eq!(
            evaluate_day(&intake(500.0, 20.0, 2500.0), &target(), &config),
            DayAdherence::Not
        );
        assert_eq!(
            evaluate_day(&DailyIntake::default(), &target(), &config),
            DayAdherence::Not
        );
    }

    #[test]
    fn test_streak_from_records() {
        assert_eq!(calc_streak_from_records(&[true, true, false, true]), 2);
        assert_eq!(calc_streak_from_records(&[false, true]), 0);
        assert_eq!(calc_streak_from_records(&[true, true, true]), 3);
        assert_eq!(calc_streak_from_records(&[]), 0);
    }

    #[test]
    fn test_streak_from_statuses_strict_and_lenient() {
        use DayAdherence::{Completed, Not, Partial};
        let days = [Completed, Partial, Completed, Not, Completed];
        assert_eq!(calc_streak_from_statuses(&days, false), 3);
        assert_eq!(calc_streak_from_statuses(&days, true), 1);
        assert_eq!(calc_streak_from_statuses(&[Not, Completed], false), 0);
    }
}
