//! Intermission
//!
//! End-of-level tally (ratios, time, bonus) and routing to the next level.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::game::state::{LevelStatistics, Playstate, Session};
use crate::level::data::{BOSS_LEVEL, SECRET_LEVEL};

/// Level a secret level returns to, per episode.
pub const SECRET_EXIT_RETURN: [usize; 6] = [1, 1, 7, 3, 4, 3];

/// Which intermission screen a level gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelCategory {
    /// Regular level: ratios, time, par and bonus.
    Normal,
    /// Boss level: episode averages and total time.
    Boss,
    /// Secret level: flat bonus.
    Secret,
}

impl LevelCategory {
    /// Category of a level index.
    pub fn of(level_index: usize) -> Self {
        match level_index {
            SECRET_LEVEL => LevelCategory::Secret,
            BOSS_LEVEL => LevelCategory::Boss,
            _ => LevelCategory::Normal,
        }
    }
}

/// Episode-wide figures shown after a boss level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeAverages {
    /// Mean kill ratio.
    pub kill_ratio: u32,
    /// Mean secret ratio.
    pub secret_ratio: u32,
    /// Mean treasure ratio.
    pub treasure_ratio: u32,
    /// Total time, clamped.
    pub total_time_secs: u32,
}

/// Everything the intermission screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermissionReport {
    /// Screen variant.
    pub category: LevelCategory,
    /// Floor number (level index + 1).
    pub floor: u32,
    /// Kills in percent.
    pub kill_ratio: u32,
    /// Secrets in percent.
    pub secret_ratio: u32,
    /// Treasure in percent.
    pub treasure_ratio: u32,
    /// Level time in seconds, clamped.
    pub time_secs: u32,
    /// Par time in seconds.
    pub par_secs: u32,
    /// Points awarded on confirm.
    pub bonus: u32,
    /// Present for boss levels.
    pub averages: Option<EpisodeAverages>,
}

/// Split seconds into whole minutes and remaining seconds.
pub fn minutes_seconds(secs: u32) -> (u32, u32) {
    (secs / 60, secs % 60)
}

/// Percentage `found / total`, floored and clamped to 100. Zero total gives 0.
pub fn ratio(found: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (u64::from(found) * 100 / u64::from(total)).min(100) as u32
}

fn mean(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    (sum as f64 / values.len() as f64).round() as u32
}

/// Tally a finished level into the session and build its report.
///
/// Appends the level's ratios to the session history and adds its time to the
/// session total.
pub fn tally(
    session: &mut Session,
    stats: &LevelStatistics,
    level_time_ms: i64,
    par_secs: u32,
    scoring: &ScoringConfig,
) -> IntermissionReport {
    let kill_ratio = ratio(stats.killed_monsters, stats.total_monsters);
    let secret_ratio = ratio(stats.found_secrets, stats.total_secrets);
    let treasure_ratio = ratio(stats.found_treasure, stats.total_treasure);

    let rounded_secs = (level_time_ms.max(0) as f64 / 1000.0).round() as u64;
    let time_secs = rounded_secs.min(u64::from(scoring.max_level_secs)) as u32;

    session.kill_ratios.push(kill_ratio);
    session.secret_ratios.push(secret_ratio);
    session.treasure_ratios.push(treasure_ratio);
    session.total_time_secs = session.total_time_secs.saturating_add(time_secs);

    let category = LevelCategory::of(session.level_index);
    let mut bonus = 0u32;
    let mut averages = None;

    match category {
        LevelCategory::Secret => {
            bonus = scoring.secret_level_bonus;
        }
        LevelCategory::Boss => {
            averages = Some(EpisodeAverages {
                kill_ratio: mean(&session.kill_ratios),
                secret_ratio: mean(&session.secret_ratios),
                treasure_ratio: mean(&session.treasure_ratios),
                total_time_secs: session.total_time_secs.min(scoring.max_level_secs),
            });
        }
        LevelCategory::Normal => {
            if par_secs > time_secs {
                bonus += (par_secs - time_secs) * scoring.par_bonus_per_second;
            }
            for r in [kill_ratio, secret_ratio, treasure_ratio] {
                if r == 100 {
                    bonus += scoring.perfect_ratio_bonus;
                }
            }
        }
    }

    IntermissionReport {
        category,
        floor: session.level_index as u32 + 1,
        kill_ratio,
        secret_ratio,
        treasure_ratio,
        time_secs,
        par_secs,
        bonus,
        averages,
    }
}

/// Where play continues after an intermission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextLevel {
    /// Start this level of the current episode.
    Level(usize),
    /// The episode is over.
    EpisodeComplete,
}

/// Route to the next level.
pub fn next_level(episode: usize, level_index: usize, playstate: Playstate) -> NextLevel {
    if playstate == Playstate::SecretLevel {
        return NextLevel::Level(SECRET_LEVEL);
    }

    match LevelCategory::of(level_index) {
        LevelCategory::Boss => NextLevel::EpisodeComplete,
        LevelCategory::Secret => NextLevel::Level(
            SECRET_EXIT_RETURN
                .get(episode)
                .copied()
                .unwrap_or(level_index + 1),
        ),
        LevelCategory::Normal => NextLevel::Level(level_index + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Skill;
    use proptest::prelude::*;

    fn session_at(level_index: usize) -> Session {
        let mut session = Session::new(Skill::Medium);
        session.level_index = level_index;
        session
    }

    fn stats(kills: (u32, u32), secrets: (u32, u32), treasure: (u32, u32)) -> LevelStatistics {
        LevelStatistics {
            killed_monsters: kills.0,
            total_monsters: kills.1,
            found_secrets: secrets.0,
            total_secrets: secrets.1,
            found_treasure: treasure.0,
            total_treasure: treasure.1,
        }
    }

    #[test]
    fn test_perfect_level_bonus() {
        // 20/20 kills, 3/3 secrets, 0/0 treasure, 90s against par 120
        let mut session = session_at(2);
        let report = tally(
            &mut session,
            &stats((20, 20), (3, 3), (0, 0)),
            90_000,
            120,
            &ScoringConfig::default(),
        );

        assert_eq!(report.kill_ratio, 100);
        assert_eq!(report.secret_ratio, 100);
        assert_eq!(report.treasure_ratio, 0);
        assert_eq!(report.bonus, 30 * 500 + 10_000 + 10_000);
        assert_eq!(report.floor, 3);
        assert_eq!(session.kill_ratios, vec![100]);
        assert_eq!(session.total_time_secs, 90);
    }

    #[test]
    fn test_ratios_floor() {
        assert_eq!(ratio(2, 3), 66);
        assert_eq!(ratio(0, 0), 0);
        assert_eq!(ratio(5, 4), 100);
    }

    #[test]
    fn test_time_rounds_and_clamps() {
        let mut session = session_at(0);
        let scoring = ScoringConfig::default();
        let report = tally(&mut session, &LevelStatistics::default(), 1_499, 0, &scoring);
        assert_eq!(report.time_secs, 1);

        let report = tally(&mut session, &LevelStatistics::default(), 7_000_000, 0, &scoring);
        assert_eq!(report.time_secs, 99 * 60);
    }

    #[test]
    fn test_no_par_bonus_over_par() {
        let mut session = session_at(0);
        let report = tally(
            &mut session,
            &stats((1, 2), (0, 1), (0, 1)),
            200_000,
            120,
            &ScoringConfig::default(),
        );
        assert_eq!(report.bonus, 0);
    }

    #[test]
    fn test_secret_level_flat_bonus() {
        let mut session = session_at(SECRET_LEVEL);
        let report = tally(
            &mut session,
            &stats((20, 20), (3, 3), (1, 1)),
            10_000,
            300,
            &ScoringConfig::default(),
        );
        assert_eq!(report.category, LevelCategory::Secret);
        assert_eq!(report.bonus, 15_000);
    }

    #[test]
    fn test_boss_level_averages() {
        let mut session = session_at(BOSS_LEVEL);
        session.kill_ratios = vec![100, 50];
        session.secret_ratios = vec![0, 0];
        session.treasure_ratios = vec![10, 20];
        session.total_time_secs = 99 * 60 - 10;

        let report = tally(
            &mut session,
            &stats((1, 1), (0, 0), (0, 1)),
            60_000,
            0,
            &ScoringConfig::default(),
        );

        let averages = report.averages.unwrap();
        // (100 + 50 + 100) / 3 = 83.3
        assert_eq!(averages.kill_ratio, 83);
        assert_eq!(averages.secret_ratio, 0);
        assert_eq!(averages.treasure_ratio, 10);
        assert_eq!(averages.total_time_secs, 99 * 60);
        assert_eq!(report.bonus, 0);
    }

    #[test]
    fn test_routing() {
        assert_eq!(next_level(0, 3, Playstate::Alive), NextLevel::Level(4));
        assert_eq!(next_level(0, 0, Playstate::SecretLevel), NextLevel::Level(9));
        assert_eq!(next_level(0, 8, Playstate::Alive), NextLevel::EpisodeComplete);
        assert_eq!(next_level(2, 9, Playstate::Alive), NextLevel::Level(7));
        assert_eq!(next_level(5, 9, Playstate::Alive), NextLevel::Level(3));
        assert_eq!(next_level(6, 9, Playstate::Alive), NextLevel::Level(10));
    }

    #[test]
    fn test_minutes_seconds() {
        assert_eq!(minutes_seconds(125), (2, 5));
    }

    proptest! {
        #[test]
        fn prop_ratio_clamped(found in any::<u32>(), total in any::<u32>()) {
            prop_assert!(ratio(found, total) <= 100);
        }
    }
}
