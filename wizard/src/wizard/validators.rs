// Step validators
//
// Pure functions: draft slice + translator -> field key -> message. An empty result means the
// step may be left. Per field the checks run required -> type -> range and only the first
// failure is reported.

use serde::Serialize;
use std::collections::BTreeMap;

use super::nutrition::{bmr_limits, KJ_PER_KCAL};
use super::sport::{INTEREST_TAGS, MAX_BLOCKS, MAX_INTEREST_TAGS, MAX_WEEKLY_SESSIONS};
use crate::i18n::Translate;
use crate::models::draft::{
    Consents, Customer, EnergyUnit, Goal, Nutrition, PlanDraft, Profile, SportDraft, SportLevel,
};
use crate::utils::validation::{check_number, is_valid_email, NumberCheck, NumberKind};

/// Field key -> localized message. Keys match the form field ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `field` unless the field already has an error.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Localized messages with built-in English fallbacks.
struct Messages<'a> {
    t: &'a dyn Translate,
}

impl<'a> Messages<'a> {
    fn new(t: &'a dyn Translate) -> Self {
        Self { t }
    }

    fn text(&self, key: &str, fallback: &str) -> String {
        self.t.lookup(key).unwrap_or_else(|| fallback.to_string())
    }

    fn required(&self) -> String {
        self.text("common.error_required", "This field is required.")
    }

    fn number(&self) -> String {
        self.text("common.error_number", "Enter a valid number.")
    }

    fn range(&self, min: f64, max: f64) -> String {
        self.range_with("common.error_range", min, max)
    }

    fn range_with(&self, key: &str, min: f64, max: f64) -> String {
        match self.t.lookup(key) {
            Some(tpl) => tpl
                .replace("{{min}}", &min.to_string())
                .replace("{{max}}", &max.to_string()),
            None => format!("Value must be between {} and {}.", min, max),
        }
    }

    /// Runs a numeric check and records the message for the first failed stage.
    fn number_field(
        &self,
        errors: &mut FieldErrors,
        field: &str,
        check: NumberCheck,
        min: f64,
        max: f64,
    ) -> Option<f64> {
        match check {
            NumberCheck::Missing => errors.add(field, self.required()),
            NumberCheck::NotANumber => errors.add(field, self.number()),
            NumberCheck::OutOfRange => errors.add(field, self.range(min, max)),
            NumberCheck::Ok(v) => return Some(v),
        }
        None
    }
}

// =========================
// Step 1: Profile
// =========================

pub fn validate_profile(profile: &Profile, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    if profile.sex.is_none() {
        e.add("sex", msg.required());
    }

    let numeric = [
        ("age", profile.age.as_ref(), NumberKind::Integer, 12.0, 100.0),
        ("height_cm", profile.height_cm.as_ref(), NumberKind::Decimal, 100.0, 230.0),
        ("weight_kg", profile.weight_kg.as_ref(), NumberKind::Decimal, 35.0, 250.0),
    ];
    for (field, input, kind, min, max) in numeric {
        msg.number_field(&mut e, field, check_number(input, kind, min, max), min, max);
    }

    if profile.activity.is_none() {
        e.add("activity", msg.required());
    }
    if profile.steps_bucket.is_none() {
        e.add("steps_bucket", msg.required());
    }
    e
}

// =========================
// Step 2: Goal
// =========================

/// `bmr_override` is the user-entered value in kcal, passed explicitly by the caller. The
/// authoritative BMR (override, else computed) is range-checked in the display unit.
pub fn validate_goal(goal: &Goal, bmr_override: Option<f64>, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    if goal.target.is_none() {
        e.add("target", msg.required());
    }

    match bmr_override.or(goal.bmr_kcal).filter(|v| v.is_finite()) {
        None => e.add("bmr", msg.required()),
        Some(kcal) => {
            let (min, max) = bmr_limits(goal.energy_unit);
            let (min_kcal, max_kcal) = match goal.energy_unit {
                EnergyUnit::Kcal => (min, max),
                EnergyUnit::KJ => (min / KJ_PER_KCAL, max / KJ_PER_KCAL),
            };
            if kcal < min_kcal || kcal > max_kcal {
                e.add(
                    "bmr",
                    format!("{} [{}]", msg.range(min, max), goal.energy_unit.label()),
                );
            }
        }
    }
    e
}

// =========================
// Step 3: Sport
// =========================

pub fn validate_sport(sport: &SportDraft, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    let Some(level) = sport.level else {
        e.add("sport_level", msg.required());
        return e;
    };

    if level == SportLevel::NoSport {
        let tags = &sport.future_multi;
        if tags.is_empty() {
            e.add("future", msg.required());
        } else if tags.len() > MAX_INTEREST_TAGS {
            e.add(
                "future",
                msg.text("step3.error_future_max3", "You can select up to 3 sports."),
            );
        } else if tags.iter().any(|tag| !INTEREST_TAGS.contains(&tag.as_str())) {
            e.add("future", msg.text("step3.error_future_unknown", "Select sports from the list."));
        } else if tags.iter().any(|tag| tag == "other") && sport.future_text.trim().is_empty() {
            e.add("future", msg.required());
        }
        return e;
    }

    if sport.plan_choice.is_none() {
        e.add("plan_choice", msg.required());
        return e;
    }

    let picked = sport.picked_ids();
    if picked.is_empty() {
        e.add("picked_own", msg.required());
    } else if sport.main_sport_id().is_none() {
        e.add("mainSportId", msg.required());
    }

    let blocks = &sport.own_blocks;
    if blocks.is_empty() {
        e.add("ownBlocks", msg.required());
        return e;
    }
    if blocks.len() > MAX_BLOCKS {
        e.add(
            "ownBlocks",
            msg.text("step3.error_blocks_max", "You can add up to 10 sports."),
        );
    }

    let max_sessions = MAX_WEEKLY_SESSIONS as f64;
    let mut total_sessions = 0.0;
    for (i, block) in blocks.iter().enumerate() {
        if block.sport_id.trim().is_empty() {
            e.add(
                format!("picked_own_{}", i),
                msg.text("step3.error_select_sport", "Select a sport."),
            );
        }

        let sessions_key = format!("sessions_per_week_{}", i);
        let sessions = check_number(
            block.sessions_per_week.as_ref(),
            NumberKind::Integer,
            1.0,
            max_sessions,
        );
        if let Some(v) = msg.number_field(&mut e, &sessions_key, sessions, 1.0, max_sessions) {
            total_sessions += v;
        }

        let minutes = check_number(block.minutes.as_ref(), NumberKind::Integer, 15.0, 300.0);
        msg.number_field(&mut e, &format!("minutes_{}", i), minutes, 15.0, 300.0);

        if block.intensity.is_none() {
            e.add(format!("intensity_{}", i), msg.required());
        }
    }

    if total_sessions > max_sessions {
        e.add(
            "sessions_total",
            msg.text(
                "step3.error_sessions_total",
                "Total trainings per week cannot exceed 18.",
            ),
        );
        let field_msg = msg.text(
            "step3.error_sessions_total_field",
            "Adjust the number of trainings (total max 18 per week).",
        );
        for i in 0..blocks.len() {
            e.add(format!("sessions_per_week_{}", i), field_msg.clone());
        }
    }
    e
}

// =========================
// Step 4: Macros
// =========================

pub fn validate_macros(nutrition: &Nutrition, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();
    let macros = &nutrition.macros;

    let fields = [
        ("macro_c", &macros.c, 40.0, 70.0, "common.error_macro_c"),
        ("macro_p", &macros.p, 5.0, 30.0, "common.error_macro_p"),
        ("macro_f", &macros.f, 15.0, 40.0, "common.error_macro_f"),
    ];

    let mut values = Vec::with_capacity(fields.len());
    for (field, input, min, max, range_key) in fields {
        match check_number(Some(input), NumberKind::Decimal, min, max) {
            NumberCheck::Missing => e.add(field, msg.required()),
            NumberCheck::NotANumber => e.add(field, msg.number()),
            NumberCheck::OutOfRange => e.add(field, msg.range_with(range_key, min, max)),
            NumberCheck::Ok(_) => {}
        }
        values.push(input.value());
    }

    if let [Some(c), Some(p), Some(f)] = values[..] {
        if (c + p + f - 100.0).abs() > 1e-9 {
            e.add(
                "macro_sum",
                msg.text("common.error_macro_sum", "Macro total must be 100%."),
            );
        }
    }
    e
}

// =========================
// Step 5: Diet
// =========================

pub const MAX_DISLIKES: usize = 4;

pub fn validate_diet(nutrition: &Nutrition, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    if nutrition.diet.is_none() {
        e.add("diet", msg.required());
    }
    if nutrition.dislikes.len() > MAX_DISLIKES {
        e.add(
            "dislikes",
            msg.text("step5.error_dislikes_max4", "You can select up to 4 items."),
        );
    }
    e
}

// =========================
// Step 6: Menu settings
// =========================

pub fn validate_menu_settings(nutrition: &Nutrition, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    if nutrition.repeats.is_none() {
        e.add("repeats", msg.required());
    }
    if nutrition.show_grams.is_none() {
        e.add("show_grams", msg.required());
    }
    e
}

// =========================
// Step 7: Plan
// =========================

pub fn validate_plan(plan: &PlanDraft, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    if plan.variant.is_none() {
        e.add("variant", msg.required());
    }
    if plan.period.is_none() {
        e.add("period", msg.required());
    }
    e
}

// =========================
// Step 8: Review
// =========================

pub fn validate_review(customer: &Customer, consents: &Consents, t: &dyn Translate) -> FieldErrors {
    let msg = Messages::new(t);
    let mut e = FieldErrors::new();

    if customer.name.trim().is_empty() {
        e.add("customer_name", msg.required());
    }

    let email = customer.email.trim();
    if email.is_empty() {
        e.add("customer_email", msg.required());
    } else if !is_valid_email(email) {
        e.add(
            "customer_email",
            msg.text("common.error_email", "Enter a valid email."),
        );
    }

    if !consents.terms {
        e.add("consent_terms", msg.required());
    }
    if !consents.privacy {
        e.add("consent_privacy", msg.required());
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Localizer;
    use crate::models::draft::{
        ActivityLevel, GoalTarget, Intensity, Macros, NumberInput, PlanChoice, Sex, SportBlock,
        StepsBucket,
    };
    use serde_json::json;

    fn t() -> Localizer {
        Localizer::empty("en")
    }

    fn complete_profile() -> Profile {
        Profile {
            sex: Some(Sex::Male),
            age: Some(NumberInput::from(30)),
            height_cm: Some(NumberInput::from(180)),
            weight_kg: Some(NumberInput::from(80)),
            activity: Some(ActivityLevel::Moderate),
            steps_bucket: Some(StepsBucket::From5kTo10k),
        }
    }

    fn block(id: &str, sessions: i64) -> SportBlock {
        SportBlock {
            sport_id: id.to_string(),
            sessions_per_week: Some(NumberInput::from(sessions)),
            minutes: Some(NumberInput::from(45)),
            intensity: Some(Intensity::Medium),
        }
    }

    fn own_plan(blocks: Vec<SportBlock>) -> SportDraft {
        let mut sport = SportDraft {
            level: Some(SportLevel::Sport),
            plan_choice: Some(PlanChoice::Own),
            own_blocks: blocks,
            ..SportDraft::default()
        };
        sport.recompute_picked_own();
        sport.ensure_main_sport();
        sport
    }

    #[test]
    fn empty_profile_reports_every_field_as_required() {
        let errors = validate_profile(&Profile::default(), &t());
        for key in ["sex", "age", "height_cm", "weight_kg", "activity", "steps_bucket"] {
            assert_eq!(errors.get(key), Some("This field is required."), "{}", key);
        }
    }

    #[test]
    fn profile_reports_type_before_range() {
        let mut profile = complete_profile();
        profile.age = Some(NumberInput::from("thirty"));
        profile.height_cm = Some(NumberInput::from(99));
        let errors = validate_profile(&profile, &t());
        assert_eq!(errors.get("age"), Some("Enter a valid number."));
        assert_eq!(errors.get("height_cm"), Some("Value must be between 100 and 230."));
        assert_eq!(errors.len(), 2);
        assert!(validate_profile(&complete_profile(), &t()).is_empty());
    }

    #[test]
    fn range_message_uses_translated_template() {
        let loc = Localizer::new(
            "cs",
            json!({ "common": { "error_range": "Hodnota {{min}} až {{max}}." } }),
            json!(null),
        );
        let mut profile = complete_profile();
        profile.weight_kg = Some(NumberInput::from(300));
        let errors = validate_profile(&profile, &loc);
        assert_eq!(errors.get("weight_kg"), Some("Hodnota 35 až 250."));
    }

    #[test]
    fn goal_requires_target_and_bmr() {
        let errors = validate_goal(&Goal::default(), None, &t());
        assert!(errors.contains("target"));
        assert_eq!(errors.get("bmr"), Some("This field is required."));
    }

    #[test]
    fn goal_checks_override_range_in_display_unit() {
        let goal = Goal {
            target: Some(GoalTarget::Maintain),
            bmr_kcal: Some(1780.0),
            bmr_override: None,
            energy_unit: EnergyUnit::KJ,
        };
        assert!(validate_goal(&goal, None, &t()).is_empty());

        // 3000 kJ is ~717 kcal, below the 4000 kJ minimum.
        let errors = validate_goal(&goal, Some(3000.0 / KJ_PER_KCAL), &t());
        assert_eq!(
            errors.get("bmr"),
            Some("Value must be between 4000 and 15000. [kJ]")
        );

        let kcal_goal = Goal {
            energy_unit: EnergyUnit::Kcal,
            ..goal
        };
        let errors = validate_goal(&kcal_goal, Some(4000.0), &t());
        assert_eq!(
            errors.get("bmr"),
            Some("Value must be between 900 and 3500. [kcal]")
        );
    }

    #[test]
    fn typed_bmr_is_checked_before_rounding() {
        let cases = [
            (EnergyUnit::Kcal, "3500", true),
            (EnergyUnit::Kcal, "3501", false),
            (EnergyUnit::Kcal, "3504", false),
            (EnergyUnit::Kcal, "900", true),
            (EnergyUnit::Kcal, "895", false),
            (EnergyUnit::KJ, "4000", true),
            (EnergyUnit::KJ, "3999", false),
            (EnergyUnit::KJ, "3996", false),
            (EnergyUnit::KJ, "15000", true),
            (EnergyUnit::KJ, "15001", false),
        ];
        for (unit, raw, valid) in cases {
            let mut goal = Goal {
                target: Some(GoalTarget::Maintain),
                bmr_kcal: Some(1780.0),
                bmr_override: None,
                energy_unit: unit,
            };
            goal.set_bmr_input(raw);
            let errors = validate_goal(&goal, goal.bmr_override, &t());
            assert_eq!(errors.is_empty(), valid, "{} {}", raw, unit.label());
        }
    }

    #[test]
    fn sport_level_is_required_first() {
        let errors = validate_sport(&SportDraft::default(), &t());
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("sport_level"));
    }

    #[test]
    fn no_sport_requires_one_to_three_known_tags() {
        let mut sport = SportDraft {
            level: Some(SportLevel::NoSport),
            ..SportDraft::default()
        };
        assert!(validate_sport(&sport, &t()).contains("future"));

        sport.future_multi = vec!["running".into(), "yoga".into()];
        assert!(validate_sport(&sport, &t()).is_empty());

        sport.future_multi = vec![
            "running".into(),
            "yoga".into(),
            "cycling".into(),
            "swimming".into(),
        ];
        assert_eq!(
            validate_sport(&sport, &t()).get("future"),
            Some("You can select up to 3 sports.")
        );

        sport.future_multi = vec!["other".into()];
        assert!(validate_sport(&sport, &t()).contains("future"));
        sport.future_text = "climbing".into();
        assert!(validate_sport(&sport, &t()).is_empty());
    }

    #[test]
    fn sessions_above_weekly_total_flag_every_block() {
        let sport = own_plan(vec![block("running", 10), block("cycling", 10)]);
        let errors = validate_sport(&sport, &t());
        assert!(errors.contains("sessions_total"));
        assert!(errors.contains("sessions_per_week_0"));
        assert!(errors.contains("sessions_per_week_1"));

        let sport = own_plan(vec![block("running", 9), block("cycling", 9)]);
        assert!(validate_sport(&sport, &t()).is_empty());
    }

    #[test]
    fn block_fields_are_checked_per_index() {
        let mut bad = block("", 0);
        bad.minutes = Some(NumberInput::from("45.5"));
        bad.intensity = None;
        let sport = own_plan(vec![block("running", 3), bad]);
        let errors = validate_sport(&sport, &t());
        assert_eq!(errors.get("picked_own_1"), Some("Select a sport."));
        assert_eq!(
            errors.get("sessions_per_week_1"),
            Some("Value must be between 1 and 18.")
        );
        assert_eq!(errors.get("minutes_1"), Some("Enter a valid number."));
        assert!(errors.contains("intensity_1"));
        assert!(!errors.contains("sessions_per_week_0"));
    }

    #[test]
    fn sport_plan_requires_blocks() {
        let sport = own_plan(Vec::new());
        let errors = validate_sport(&sport, &t());
        assert!(errors.contains("ownBlocks"));
        assert!(errors.contains("picked_own"));
    }

    #[test]
    fn macros_must_sum_to_hundred() {
        let mut nutrition = Nutrition::default();
        assert!(validate_macros(&nutrition, &t()).is_empty());

        nutrition.macros = Macros::new(50.0, 25.0, 20.0);
        let errors = validate_macros(&nutrition, &t());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("macro_sum"), Some("Macro total must be 100%."));
    }

    #[test]
    fn macro_ranges_use_field_specific_templates() {
        let loc = Localizer::new(
            "en",
            json!({ "common": { "error_macro_p": "Protein {{min}}-{{max}} %" } }),
            json!(null),
        );
        let mut nutrition = Nutrition::default();
        nutrition.macros = Macros::new(60.0, 5.0, 35.0);
        let errors = validate_macros(&nutrition, &loc);
        assert_eq!(errors.get("macro_p"), Some("Protein 5-30 %"));
        assert_eq!(
            errors.get("macro_f"),
            Some("Value must be between 15 and 40.")
        );
    }

    #[test]
    fn diet_limits_dislikes() {
        let mut nutrition = Nutrition::default();
        nutrition.dislikes = vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];
        assert!(validate_diet(&nutrition, &t()).contains("dislikes"));
        nutrition.diet = None;
        nutrition.dislikes.truncate(4);
        let errors = validate_diet(&nutrition, &t());
        assert!(errors.contains("diet"));
        assert!(!errors.contains("dislikes"));
    }

    #[test]
    fn menu_and_plan_choices_required() {
        let mut nutrition = Nutrition::default();
        assert!(validate_menu_settings(&nutrition, &t()).contains("show_grams"));
        nutrition.show_grams = Some(crate::models::draft::ShowGrams::Yes);
        assert!(validate_menu_settings(&nutrition, &t()).is_empty());

        let plan = PlanDraft {
            variant: None,
            period: None,
            ..PlanDraft::default()
        };
        assert_eq!(validate_plan(&plan, &t()).len(), 2);
        assert!(validate_plan(&PlanDraft::default(), &t()).is_empty());
    }

    #[test]
    fn review_checks_email_shape_and_consents() {
        let customer = Customer {
            name: "Jana".into(),
            email: "jana@example".into(),
            newsletter: false,
        };
        let errors = validate_review(&customer, &Consents::default(), &t());
        assert_eq!(errors.get("customer_email"), Some("Enter a valid email."));
        assert!(errors.contains("consent_terms"));
        assert!(errors.contains("consent_privacy"));
        assert!(!errors.contains("customer_name"));

        let customer = Customer {
            email: "jana@example.cz".into(),
            ..customer
        };
        let consents = Consents {
            terms: true,
            privacy: true,
        };
        assert!(validate_review(&customer, &consents, &t()).is_empty());
    }
}
