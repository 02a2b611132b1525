// Energy and nutrition rules
//
// BMR estimation (Mifflin-St Jeor), kcal/kJ conversion, macro defaults and the derived
// premium flag.

use crate::models::catalog::SportsCatalog;
use crate::models::draft::{
    Diet, EnergyUnit, FormDraft, Goal, Macros, NumberInput, Nutrition, Profile, Sex,
};

pub const KJ_PER_KCAL: f64 = 4.184;

/// Accepted BMR range in the given unit.
pub fn bmr_limits(unit: EnergyUnit) -> (f64, f64) {
    match unit {
        EnergyUnit::Kcal => (900.0, 3500.0),
        EnergyUnit::KJ => (4000.0, 15000.0),
    }
}

/// Mifflin-St Jeor estimate in kcal/day, rounded. Without a sex the mean of both formulas
/// is used.
pub fn mifflin_st_jeor(sex: Option<Sex>, age: f64, height_cm: f64, weight_kg: f64) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age;
    let male = base + 5.0;
    let female = base - 161.0;
    match sex {
        Some(Sex::Male) => male.round(),
        Some(Sex::Female) => female.round(),
        None => ((male + female) / 2.0).round(),
    }
}

/// BMR from a profile, `None` until age, height and weight are all usable.
pub fn bmr_from_profile(profile: &Profile) -> Option<f64> {
    let value = |input: &Option<NumberInput>| {
        input.as_ref().and_then(|v| v.value()).filter(|v| *v > 0.0)
    };
    let age = value(&profile.age)?;
    let height = value(&profile.height_cm)?;
    let weight = value(&profile.weight_kg)?;
    Some(mifflin_st_jeor(profile.sex, age, height, weight))
}

pub fn round_kcal(kcal: f64) -> f64 {
    (kcal / 10.0).round() * 10.0
}

pub fn round_kj(kj: f64) -> f64 {
    (kj / 50.0).round() * 50.0
}

/// kcal value expressed in `unit`, rounded for display (kcal to 10, kJ to 50).
pub fn kcal_to_unit(kcal: f64, unit: EnergyUnit) -> f64 {
    match unit {
        EnergyUnit::Kcal => round_kcal(kcal),
        EnergyUnit::KJ => round_kj(kcal * KJ_PER_KCAL),
    }
}

/// Input value in `unit` converted to kcal exactly. Range checks run on this value, so it is
/// never rounded.
pub fn unit_to_kcal(value: f64, unit: EnergyUnit) -> f64 {
    match unit {
        EnergyUnit::Kcal => value,
        EnergyUnit::KJ => value / KJ_PER_KCAL,
    }
}

impl Goal {
    /// Refresh the computed BMR from the profile. The user override is left alone.
    pub fn refresh_computed_bmr(&mut self, profile: &Profile) {
        if let Some(bmr) = bmr_from_profile(profile) {
            self.bmr_kcal = Some(bmr);
        }
    }

    /// Apply the raw BMR input field. Blank or unparsable input clears the override.
    pub fn set_bmr_input(&mut self, raw: &str) {
        let parsed = raw.trim().replace(',', ".").parse::<f64>().ok();
        self.bmr_override = parsed
            .filter(|v| v.is_finite())
            .map(|v| unit_to_kcal(v, self.energy_unit));
    }

    /// Authoritative BMR in the display unit.
    pub fn display_bmr(&self) -> Option<f64> {
        self.effective_bmr_kcal()
            .map(|kcal| kcal_to_unit(kcal, self.energy_unit))
    }
}

// =========================
// Macros & premium
// =========================

/// Recommended split: the main sport's catalog entry, else 55/25/20.
pub fn default_macros(catalog: &SportsCatalog, main_sport: Option<&str>) -> Macros {
    catalog.macros_for(main_sport).unwrap_or_default()
}

impl Nutrition {
    /// Premium is required by any diet restriction, any dislike or a customized split.
    pub fn needs_premium(&self) -> bool {
        let restricted = matches!(self.diet, Some(d) if d != Diet::NoRestrictions);
        restricted || !self.dislikes.is_empty() || self.customized
    }

    /// Seed macros with the recommended split unless the user customized them.
    pub fn seed_macros(&mut self, recommended: Macros) {
        if !self.customized {
            self.macros = recommended;
        }
    }

    /// Record a user edit of the macro split.
    pub fn set_macros(&mut self, macros: Macros, recommended: &Macros) {
        self.macros = macros;
        self.customized = !self.macros.same_split(recommended);
    }

    /// Drop every premium-only choice.
    pub fn reset_to_standard(&mut self, recommended: Macros) {
        self.diet = Some(Diet::NoRestrictions);
        self.dislikes.clear();
        self.macros = recommended;
        self.customized = false;
    }
}

impl FormDraft {
    /// Recompute `plan.auto_premium` from the nutrition choices.
    pub fn refresh_auto_premium(&mut self) -> bool {
        self.plan.auto_premium = self.nutrition.needs_premium();
        self.plan.auto_premium
    }

    /// Revert nutrition to standard-plan defaults and clear the premium flag.
    pub fn reset_to_standard_defaults(&mut self, catalog: &SportsCatalog) {
        let recommended = default_macros(catalog, self.sport.main_sport_id());
        self.nutrition.reset_to_standard(recommended);
        self.refresh_auto_premium();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(sex: Option<Sex>) -> Profile {
        Profile {
            sex,
            age: Some(NumberInput::from(30)),
            height_cm: Some(NumberInput::from(180)),
            weight_kg: Some(NumberInput::from(80)),
            ..Profile::default()
        }
    }

    #[test]
    fn mifflin_st_jeor_by_sex() {
        assert_eq!(bmr_from_profile(&profile(Some(Sex::Male))), Some(1780.0));
        assert_eq!(bmr_from_profile(&profile(Some(Sex::Female))), Some(1614.0));
        assert_eq!(bmr_from_profile(&profile(None)), Some(1697.0));
    }

    #[test]
    fn incomplete_profile_has_no_bmr() {
        let mut p = profile(Some(Sex::Male));
        p.weight_kg = Some(NumberInput::from(""));
        assert_eq!(bmr_from_profile(&p), None);
    }

    #[test]
    fn unit_rounding() {
        assert_eq!(kcal_to_unit(1784.0, EnergyUnit::Kcal), 1780.0);
        // 1780 kcal = 7447.52 kJ
        assert_eq!(kcal_to_unit(1780.0, EnergyUnit::KJ), 7450.0);
        assert_eq!(unit_to_kcal(1784.0, EnergyUnit::Kcal), 1784.0);
        assert!((unit_to_kcal(8368.0, EnergyUnit::KJ) - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn bmr_input_is_stored_in_kcal() {
        let mut goal = Goal {
            energy_unit: EnergyUnit::KJ,
            bmr_kcal: Some(1780.0),
            ..Goal::default()
        };
        goal.set_bmr_input("8368");
        assert_eq!(goal.bmr_override, Some(8368.0 / KJ_PER_KCAL));
        assert_eq!(goal.effective_bmr_kcal(), goal.bmr_override);
        assert_eq!(goal.display_bmr(), Some(8350.0));

        goal.set_bmr_input("  ");
        assert_eq!(goal.bmr_override, None);
        assert_eq!(goal.effective_bmr_kcal(), Some(1780.0));
    }

    #[test]
    fn auto_premium_follows_nutrition() {
        let mut draft = FormDraft::default();
        assert!(!draft.refresh_auto_premium());

        draft.nutrition.diet = Some(Diet::Vegan);
        assert!(draft.refresh_auto_premium());

        draft.nutrition.diet = Some(Diet::NoRestrictions);
        draft.nutrition.dislikes = vec!["fish".into()];
        assert!(draft.refresh_auto_premium());

        draft.nutrition.dislikes.clear();
        let recommended = Macros::default();
        draft.nutrition.set_macros(Macros::new(60.0, 20.0, 20.0), &recommended);
        assert!(draft.nutrition.customized);
        assert!(draft.refresh_auto_premium());

        draft.nutrition.set_macros(Macros::new(55.0, 25.0, 20.0), &recommended);
        assert!(!draft.nutrition.customized);
        assert!(!draft.refresh_auto_premium());
    }

    #[test]
    fn reset_to_standard_defaults_uses_catalog_split() {
        let catalog: SportsCatalog = serde_json::from_value(serde_json::json!({
            "running": { "labels": { "en": "Running" }, "macros": { "c": 60, "f": 20, "p": 20 } }
        }))
        .expect("catalog");

        let mut draft = FormDraft::default();
        draft.sport.main_sport_own = Some("running".into());
        draft.sport.level = Some(crate::models::draft::SportLevel::Sport);
        draft.nutrition.diet = Some(Diet::Vegetarian);
        draft.nutrition.dislikes = vec!["fish".into()];
        draft.nutrition.customized = true;
        draft.refresh_auto_premium();

        draft.reset_to_standard_defaults(&catalog);
        assert_eq!(draft.nutrition.diet, Some(Diet::NoRestrictions));
        assert!(draft.nutrition.dislikes.is_empty());
        assert!(!draft.nutrition.customized);
        assert_eq!(draft.nutrition.macros, Macros::new(60.0, 20.0, 20.0));
        assert!(!draft.plan.auto_premium);
    }

    #[test]
    fn seed_keeps_customized_split() {
        let mut nutrition = Nutrition::default();
        nutrition.seed_macros(Macros::new(60.0, 20.0, 20.0));
        assert_eq!(nutrition.macros, Macros::new(60.0, 20.0, 20.0));

        nutrition.customized = true;
        nutrition.macros = Macros::new(50.0, 30.0, 20.0);
        nutrition.seed_macros(Macros::default());
        assert_eq!(nutrition.macros, Macros::new(50.0, 30.0, 20.0));
    }
}
