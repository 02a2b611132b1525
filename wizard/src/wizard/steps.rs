// Wizard steps
//
// The eight steps in order, their assets, validators and entry hooks.

use serde::{Deserialize, Serialize};

use super::nutrition::default_macros;
use super::validators::{
    validate_diet, validate_goal, validate_macros, validate_menu_settings, validate_plan,
    validate_profile, validate_review, validate_sport, FieldErrors,
};
use crate::i18n::Translate;
use crate::models::catalog::SportsCatalog;
use crate::models::draft::{Diet, FormDraft, PlanPeriod, PlanVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Profile,
    Goal,
    Sport,
    Balance,
    Diet,
    MenuSettings,
    Plan,
    Review,
}

impl Step {
    pub const ALL: [Step; 8] = [
        Step::Profile,
        Step::Goal,
        Step::Sport,
        Step::Balance,
        Step::Diet,
        Step::MenuSettings,
        Step::Plan,
        Step::Review,
    ];

    pub const FIRST: Step = Step::Profile;
    pub const LAST: Step = Step::Review;

    /// Zero-based position.
    pub fn index(self) -> usize {
        self as usize
    }

    /// One-based position, as shown in the stepper.
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Step::ALL.get(index).copied()
    }

    /// Nearest valid step for an arbitrary (possibly negative) index.
    pub fn clamped(index: i64) -> Step {
        let max = (Step::ALL.len() - 1) as i64;
        Step::ALL[index.clamp(0, max) as usize]
    }

    pub fn next(self) -> Option<Step> {
        Step::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Option<Step> {
        self.index().checked_sub(1).and_then(Step::from_index)
    }

    pub fn markup_path(self) -> &'static str {
        match self {
            Step::Profile => "steps/01-profile.html",
            Step::Goal => "steps/02-goal.html",
            Step::Sport => "steps/03-sport.html",
            Step::Balance => "steps/04-balance.html",
            Step::Diet => "steps/05-nutrition.html",
            Step::MenuSettings => "steps/06-menu-settings.html",
            Step::Plan => "steps/07-plan.html",
            Step::Review => "steps/08-review.html",
        }
    }

    pub fn title_key(self) -> String {
        format!("step{}.title", self.number())
    }

    pub fn default_title(self) -> &'static str {
        match self {
            Step::Profile => "Profile",
            Step::Goal => "Goal",
            Step::Sport => "Sport",
            Step::Balance => "Macros",
            Step::Diet => "Diet",
            Step::MenuSettings => "Menu settings",
            Step::Plan => "Plan",
            Step::Review => "Review",
        }
    }

    /// Localized title with a built-in fallback.
    pub fn title(self, t: &dyn Translate) -> String {
        t.lookup(&self.title_key())
            .unwrap_or_else(|| self.default_title().to_string())
    }

    /// Steps whose entry hook reads the sports catalog.
    pub fn needs_catalog(self) -> bool {
        matches!(self, Step::Sport | Step::Balance | Step::Plan)
    }
}

/// Run the validator of `step` against the draft.
pub fn validate(step: Step, draft: &FormDraft, t: &dyn Translate) -> FieldErrors {
    match step {
        Step::Profile => validate_profile(&draft.profile, t),
        Step::Goal => validate_goal(&draft.goal, draft.goal.bmr_override, t),
        Step::Sport => validate_sport(&draft.sport, t),
        Step::Balance => validate_macros(&draft.nutrition, t),
        Step::Diet => validate_diet(&draft.nutrition, t),
        Step::MenuSettings => validate_menu_settings(&draft.nutrition, t),
        Step::Plan => validate_plan(&draft.plan, t),
        Step::Review => validate_review(&draft.customer, &draft.consents, t),
    }
}

/// Derived state refreshed whenever a step is entered.
pub fn on_enter(step: Step, draft: &mut FormDraft, catalog: &SportsCatalog, lang: &str) {
    match step {
        Step::Profile => {}
        Step::Goal => {
            let profile = draft.profile.clone();
            draft.goal.refresh_computed_bmr(&profile);
        }
        Step::Sport => draft.sport.ensure_defaults(),
        Step::Balance => {
            let recommended = default_macros(catalog, draft.sport.main_sport_id());
            draft.nutrition.seed_macros(recommended);
            draft.refresh_auto_premium();
        }
        Step::Diet => {
            if draft.nutrition.diet.is_none() {
                draft.nutrition.diet = Some(Diet::NoRestrictions);
            }
            draft.refresh_auto_premium();
        }
        Step::MenuSettings => {}
        Step::Plan => {
            let plan = &mut draft.plan;
            plan.variant.get_or_insert(PlanVariant::Standard);
            plan.period.get_or_insert(PlanPeriod::Week);
            if draft.refresh_auto_premium() {
                draft.plan.variant = Some(PlanVariant::Premium);
            }
            draft.plan.refresh_price(lang);
        }
        Step::Review => draft.plan.refresh_price(lang),
    }
}
