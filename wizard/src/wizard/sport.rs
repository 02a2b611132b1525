// Sport step rules
//
// Users who train describe their week as blocks (sport, sessions, minutes, intensity).
// Users who don't pick up to three sports they would like to start with.

use crate::errors::WizardError;
use crate::models::catalog::SportsCatalog;
use crate::models::draft::{PlanChoice, SportBlock, SportDraft, SportLevel};

pub const MAX_BLOCKS: usize = 10;
pub const MAX_WEEKLY_SESSIONS: u32 = 18;
pub const MAX_INTEREST_TAGS: usize = 3;

/// Interest tags offered when the user does not train yet.
pub const INTEREST_TAGS: [&str; 8] = [
    "running",
    "cycling",
    "swimming",
    "fitness",
    "yoga",
    "team_sports",
    "martial_arts",
    "other",
];

/// Display order of catalog groups.
pub const GROUP_ORDER: [&str; 8] = [
    "endurance",
    "individual",
    "team",
    "fitness",
    "water",
    "winter",
    "combat",
    "other",
];

impl SportDraft {
    /// Select the activity level. Training always means the user's own plan.
    pub fn set_level(&mut self, level: SportLevel) {
        self.level = Some(level);
        self.plan_choice = match level {
            SportLevel::Sport => Some(PlanChoice::Own),
            SportLevel::NoSport => None,
        };
        if level == SportLevel::Sport {
            self.ensure_defaults();
        }
    }

    /// Normalize state on entering the step: one default block for trainees, derived
    /// fields recomputed.
    pub fn ensure_defaults(&mut self) {
        match self.level {
            Some(SportLevel::Sport) => {
                self.plan_choice = Some(PlanChoice::Own);
                if self.own_blocks.is_empty() {
                    self.own_blocks.push(SportBlock::default());
                }
                let defaults = SportBlock::default();
                for block in &mut self.own_blocks {
                    if block.sessions_per_week.as_ref().map_or(true, |v| v.is_blank()) {
                        block.sessions_per_week = defaults.sessions_per_week.clone();
                    }
                    if block.minutes.as_ref().map_or(true, |v| v.is_blank()) {
                        block.minutes = defaults.minutes.clone();
                    }
                    if block.intensity.is_none() {
                        block.intensity = defaults.intensity;
                    }
                }
            }
            Some(SportLevel::NoSport) => self.plan_choice = None,
            None => self.plan_choice = None,
        }
        self.recompute_picked_own();
        self.ensure_main_sport();
    }

    /// Append an empty block. Fails once the block limit is reached.
    pub fn add_block(&mut self) -> Result<usize, WizardError> {
        if self.own_blocks.len() >= MAX_BLOCKS {
            return Err(WizardError::BlockLimit { max: MAX_BLOCKS });
        }
        self.own_blocks.push(SportBlock::default());
        self.recompute_picked_own();
        Ok(self.own_blocks.len() - 1)
    }

    pub fn remove_block(&mut self, index: usize) -> Option<SportBlock> {
        if index >= self.own_blocks.len() {
            return None;
        }
        let removed = self.own_blocks.remove(index);
        self.recompute_picked_own();
        self.ensure_main_sport();
        Some(removed)
    }

    /// Set the sport of a block and refresh derived fields.
    pub fn set_block_sport(&mut self, index: usize, sport_id: &str) -> bool {
        let Some(block) = self.own_blocks.get_mut(index) else {
            return false;
        };
        block.sport_id = sport_id.trim().to_string();
        self.recompute_picked_own();
        self.ensure_main_sport();
        true
    }

    /// `picked_own` = distinct non-empty block sport ids in block order.
    pub fn recompute_picked_own(&mut self) {
        let mut picked: Vec<String> = Vec::new();
        for block in &self.own_blocks {
            let id = block.sport_id.trim();
            if !id.is_empty() && !picked.iter().any(|p| p == id) {
                picked.push(id.to_string());
            }
        }
        self.picked_own = picked;
    }

    /// Keep the main sport among the picked ones, defaulting to the first.
    pub fn ensure_main_sport(&mut self) {
        let valid = self
            .main_sport_own
            .as_ref()
            .is_some_and(|m| self.picked_own.contains(m));
        if !valid {
            self.main_sport_own = self.picked_own.first().cloned();
        }
    }

    /// Choose the main sport. Only picked sports of a training user are accepted.
    pub fn set_main_sport(&mut self, sport_id: &str) -> bool {
        if self.level != Some(SportLevel::Sport) || !self.picked_own.iter().any(|p| p == sport_id)
        {
            return false;
        }
        self.main_sport_own = Some(sport_id.to_string());
        true
    }

    /// Sports of the active plan (empty unless the user trains).
    pub fn picked_ids(&self) -> &[String] {
        match self.level {
            Some(SportLevel::Sport) => self.picked_own.as_slice(),
            _ => &[],
        }
    }

    /// Main sport of the active plan.
    pub fn main_sport_id(&self) -> Option<&str> {
        match self.level {
            Some(SportLevel::Sport) => self.main_sport_own.as_deref(),
            _ => None,
        }
    }

    pub fn total_sessions(&self) -> u32 {
        self.own_blocks
            .iter()
            .filter_map(|b| b.sessions_per_week.as_ref().and_then(|v| v.integer()))
            .filter(|v| *v > 0)
            .map(|v| v as u32)
            .sum()
    }

    /// Toggle an interest tag. Adding beyond the tag limit is refused.
    pub fn toggle_interest(&mut self, tag: &str) -> bool {
        if let Some(pos) = self.future_multi.iter().position(|t| t == tag) {
            self.future_multi.remove(pos);
            if tag == "other" {
                self.future_text.clear();
            }
            return true;
        }
        if self.future_multi.len() >= MAX_INTEREST_TAGS {
            return false;
        }
        self.future_multi.push(tag.to_string());
        true
    }

    /// Drop the state of the branch the user did not take before leaving the step.
    pub fn cleanup_before_leave(&mut self) {
        match self.level {
            Some(SportLevel::NoSport) => {
                self.future_multi.truncate(MAX_INTEREST_TAGS);
                if !self.future_multi.iter().any(|t| t == "other") {
                    self.future_text.clear();
                }
                self.plan_choice = None;
                self.own_blocks.clear();
                self.picked_own.clear();
                self.main_sport_own = None;
            }
            Some(SportLevel::Sport) => {
                self.plan_choice = Some(PlanChoice::Own);
                self.future_multi.clear();
                self.future_text.clear();
                self.recompute_picked_own();
                self.ensure_main_sport();
            }
            None => *self = SportDraft::default(),
        }
    }
}

/// Catalog sport ids in display order: groups by `GROUP_ORDER`, unknown groups last.
pub fn ordered_sport_ids(catalog: &SportsCatalog) -> Vec<String> {
    let mut groups = catalog.grouped();
    let mut ids = Vec::new();
    for group in GROUP_ORDER {
        if let Some(list) = groups.remove(group) {
            ids.extend(list);
        }
    }
    for list in groups.into_values() {
        ids.extend(list);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::SportRecord;
    use crate::models::draft::NumberInput;
    use std::collections::HashMap;

    #[test]
    fn sport_ids_follow_group_order() {
        let record = |group: Option<&str>| SportRecord {
            group: group.map(str::to_string),
            ..SportRecord::default()
        };
        let mut sports = HashMap::new();
        sports.insert("football".to_string(), record(Some("team")));
        sports.insert("running".to_string(), record(Some("endurance")));
        sports.insert("chess".to_string(), record(Some("mind")));
        sports.insert("cycling".to_string(), record(Some("endurance")));
        sports.insert("dance".to_string(), record(None));
        let ids = ordered_sport_ids(&SportsCatalog::new(sports));
        assert_eq!(ids, vec!["cycling", "running", "football", "dance", "chess"]);
    }

    fn with_blocks(ids: &[&str]) -> SportDraft {
        let mut sport = SportDraft::default();
        sport.set_level(SportLevel::Sport);
        sport.own_blocks.clear();
        for id in ids {
            sport.own_blocks.push(SportBlock {
                sport_id: id.to_string(),
                ..SportBlock::default()
            });
        }
        sport.recompute_picked_own();
        sport.ensure_main_sport();
        sport
    }

    #[test]
    fn choosing_sport_seeds_default_block() {
        let mut sport = SportDraft::default();
        sport.set_level(SportLevel::Sport);
        assert_eq!(sport.plan_choice, Some(PlanChoice::Own));
        assert_eq!(sport.own_blocks, vec![SportBlock::default()]);
        assert_eq!(
            sport.own_blocks[0].sessions_per_week,
            Some(NumberInput::from(3))
        );
    }

    #[test]
    fn picked_own_is_distinct_in_block_order() {
        let sport = with_blocks(&["cycling", "running", "cycling", ""]);
        assert_eq!(sport.picked_own, vec!["cycling", "running"]);
        assert_eq!(sport.main_sport_id(), Some("cycling"));
    }

    #[test]
    fn removing_main_sport_falls_back_to_first_picked() {
        let mut sport = with_blocks(&["cycling", "running"]);
        assert!(sport.set_main_sport("running"));
        assert!(!sport.set_main_sport("chess"));
        sport.remove_block(1);
        assert_eq!(sport.main_sport_id(), Some("cycling"));
    }

    #[test]
    fn block_limit_is_enforced() {
        let mut sport = with_blocks(&[]);
        for _ in 0..MAX_BLOCKS {
            sport.add_block().expect("below limit");
        }
        assert_eq!(
            sport.add_block(),
            Err(WizardError::BlockLimit { max: MAX_BLOCKS })
        );
        assert_eq!(sport.own_blocks.len(), MAX_BLOCKS);
    }

    #[test]
    fn interest_tags_capped_at_three() {
        let mut sport = SportDraft::default();
        sport.set_level(SportLevel::NoSport);
        assert!(sport.toggle_interest("running"));
        assert!(sport.toggle_interest("yoga"));
        assert!(sport.toggle_interest("other"));
        assert!(!sport.toggle_interest("cycling"));
        sport.future_text = "climbing".into();
        assert!(sport.toggle_interest("other"));
        assert!(sport.future_text.is_empty());
        assert_eq!(sport.future_multi, vec!["running", "yoga"]);
    }

    #[test]
    fn cleanup_prunes_the_untaken_branch() {
        let mut sport = with_blocks(&["running"]);
        sport.future_multi = vec!["yoga".into()];
        sport.cleanup_before_leave();
        assert!(sport.future_multi.is_empty());
        assert_eq!(sport.picked_own, vec!["running"]);

        sport.set_level(SportLevel::NoSport);
        sport.future_multi = vec!["yoga".into()];
        sport.future_text = "stale".into();
        sport.cleanup_before_leave();
        assert!(sport.own_blocks.is_empty());
        assert!(sport.picked_own.is_empty());
        assert_eq!(sport.main_sport_own, None);
        assert!(sport.future_text.is_empty());
        assert_eq!(sport.main_sport_id(), None);
    }

    #[test]
    fn total_sessions_ignores_invalid_entries() {
        let mut sport = with_blocks(&["running", "cycling"]);
        sport.own_blocks[0].sessions_per_week = Some(NumberInput::from(10));
        sport.own_blocks[1].sessions_per_week = Some(NumberInput::from("x"));
        assert_eq!(sport.total_sessions(), 10);
    }
}
