//! Review allocation sizing.
//!
//! Participant and team counts must both be positive; callers validate them
//! before building a strategy.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Every student performs `reviews` reviews.
    StudentPaced {
        participants: u32,
        teams: u32,
        reviews: u32,
    },
    /// Every team receives `reviews` reviews.
    TeamPaced {
        participants: u32,
        teams: u32,
        reviews: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationSizing {
    pub reviews_per_team: u64,
    pub reviews_needed: u64,
    pub reviews_per_student: u64,
}

impl AllocationStrategy {
    pub fn reviews_per_team(&self) -> u64 {
        match *self {
            AllocationStrategy::StudentPaced {
                participants,
                teams,
                reviews,
            } => ratio(product(participants, reviews), teams),
            AllocationStrategy::TeamPaced { reviews, .. } => u64::from(reviews),
        }
    }

    pub fn reviews_needed(&self) -> u64 {
        match *self {
            AllocationStrategy::StudentPaced {
                participants,
                reviews,
                ..
            } => product(participants, reviews),
            AllocationStrategy::TeamPaced { teams, reviews, .. } => product(teams, reviews),
        }
    }

    pub fn reviews_per_student(&self) -> u64 {
        match *self {
            AllocationStrategy::StudentPaced { reviews, .. } => u64::from(reviews),
            AllocationStrategy::TeamPaced {
                participants,
                teams,
                reviews,
            } => ratio(product(teams, reviews), participants),
        }
    }

    pub fn sizing(&self) -> AllocationSizing {
        AllocationSizing {
            reviews_per_team: self.reviews_per_team(),
            reviews_needed: self.reviews_needed(),
            reviews_per_student: self.reviews_per_student(),
        }
    }
}

/// Two u32 counts always multiply within u64.
fn product(count: u32, reviews: u32) -> u64 {
    u64::from(count) * u64::from(reviews)
}

/// Nearest integer, halves rounded up.
fn ratio(numerator: u64, denominator: u32) -> u64 {
    (numerator as f64 / f64::from(denominator)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_paced_sizing() {
        let strategy = AllocationStrategy::StudentPaced {
            participants: 30,
            teams: 10,
            reviews: 3,
        };
        assert_eq!(
            strategy.sizing(),
            AllocationSizing {
                reviews_per_team: 9,
                reviews_needed: 90,
                reviews_per_student: 3,
            }
        );
    }

    #[test]
    fn team_paced_sizing() {
        let strategy = AllocationStrategy::TeamPaced {
            participants: 30,
            teams: 10,
            reviews: 3,
        };
        assert_eq!(
            strategy.sizing(),
            AllocationSizing {
                reviews_per_team: 3,
                reviews_needed: 30,
                reviews_per_student: 1,
            }
        );
    }

    #[test]
    fn ratios_round_halves_up() {
        let strategy = AllocationStrategy::StudentPaced {
            participants: 5,
            teams: 2,
            reviews: 1,
        };
        assert_eq!(strategy.reviews_per_team(), 3);

        let strategy = AllocationStrategy::TeamPaced {
            participants: 7,
            teams: 3,
            reviews: 2,
        };
        assert_eq!(strategy.reviews_per_student(), 1);
    }

    #[test]
    fn large_cohorts_do_not_overflow() {
        let strategy = AllocationStrategy::StudentPaced {
            participants: 100_000,
            teams: 20_000,
            reviews: 50_000,
        };
        assert_eq!(
            strategy.sizing(),
            AllocationSizing {
                reviews_per_team: 250_000,
                reviews_needed: 5_000_000_000,
                reviews_per_student: 50_000,
            }
        );

        let strategy = AllocationStrategy::TeamPaced {
            participants: 3,
            teams: u32::MAX,
            reviews: u32::MAX,
        };
        assert_eq!(strategy.reviews_needed(), u64::from(u32::MAX) * u64::from(u32::MAX));
        assert_eq!(strategy.reviews_per_team(), u64::from(u32::MAX));
    }
}
