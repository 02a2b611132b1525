// Form draft (the user's answers across all wizard steps)
//
// The draft is serialized verbatim into the `formState` storage key and into the `params`
// blob of the order request, so field names here are the persisted names.
//
// NOTE: Choice fields deserialize leniently. A stored value that no longer matches an enum
// variant is dropped (treated as "not chosen yet") instead of invalidating the whole draft.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// =========================
// Lenient deserialization helpers
// =========================

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

// =========================
// Numeric input
// =========================

/// A numeric form value exactly as the step renderer captured it.
///
/// Inputs arrive either as numbers or as the raw text of an input element. Keeping the raw
/// text lets validators distinguish "missing" from "not a number" from "out of range".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
}

impl NumberInput {
    pub fn is_blank(&self) -> bool {
        matches!(self, NumberInput::Text(s) if s.trim().is_empty())
    }

    /// Parsed finite value (decimal comma accepted).
    pub fn value(&self) -> Option<f64> {
        match self {
            NumberInput::Number(n) => Some(*n).filter(|n| n.is_finite()),
            NumberInput::Text(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite()),
        }
    }

    pub fn integer(&self) -> Option<i64> {
        self.value().filter(|n| n.fract() == 0.0).map(|n| n as i64)
    }
}

impl From<f64> for NumberInput {
    fn from(value: f64) -> Self {
        NumberInput::Number(value)
    }
}

impl From<i64> for NumberInput {
    fn from(value: i64) -> Self {
        NumberInput::Number(value as f64)
    }
}

impl From<&str> for NumberInput {
    fn from(value: &str) -> Self {
        NumberInput::Text(value.to_string())
    }
}

/// Value of an optional numeric field, `None` when missing or unparsable.
pub fn number_value(input: Option<&NumberInput>) -> Option<f64> {
    input.and_then(NumberInput::value)
}

// =========================
// Step 1: Profile
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepsBucket {
    Under5k,
    From5kTo10k,
    From10kTo15k,
    Over15k,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    #[serde(deserialize_with = "lenient")]
    pub sex: Option<Sex>,
    pub age: Option<NumberInput>,
    pub height_cm: Option<NumberInput>,
    pub weight_kg: Option<NumberInput>,
    #[serde(deserialize_with = "lenient")]
    pub activity: Option<ActivityLevel>,
    #[serde(deserialize_with = "lenient")]
    pub steps_bucket: Option<StepsBucket>,
}

// =========================
// Step 2: Goal & BMR
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalTarget {
    Lose,
    Maintain,
    Gain,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyUnit {
    #[default]
    #[serde(rename = "kcal")]
    Kcal,
    #[serde(rename = "kJ", alias = "kj")]
    KJ,
}

impl EnergyUnit {
    pub fn label(&self) -> &'static str {
        match self {
            EnergyUnit::Kcal => "kcal",
            EnergyUnit::KJ => "kJ",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Goal {
    #[serde(deserialize_with = "lenient")]
    pub target: Option<GoalTarget>,
    /// Computed from the profile (Mifflin-St Jeor), kcal.
    pub bmr_kcal: Option<f64>,
    /// User-entered value, always stored normalized to kcal.
    pub bmr_override: Option<f64>,
    #[serde(deserialize_with = "lenient_or_default")]
    pub energy_unit: EnergyUnit,
}

impl Goal {
    /// The BMR shown to the user: the override wins over the computed value.
    pub fn effective_bmr_kcal(&self) -> Option<f64> {
        self.bmr_override.or(self.bmr_kcal)
    }
}

// =========================
// Step 3: Sport
// =========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SportLevel {
    #[serde(rename = "none")]
    NoSport,
    #[serde(rename = "sport")]
    Sport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChoice {
    Own,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    #[default]
    Medium,
    High,
}

/// One user-defined training entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportBlock {
    #[serde(alias = "sportId")]
    pub sport_id: String,
    #[serde(alias = "sessions")]
    pub sessions_per_week: Option<NumberInput>,
    pub minutes: Option<NumberInput>,
    #[serde(deserialize_with = "lenient")]
    pub intensity: Option<Intensity>,
}

impl Default for SportBlock {
    fn default() -> Self {
        Self {
            sport_id: String::new(),
            sessions_per_week: Some(NumberInput::from(3)),
            minutes: Some(NumberInput::from(45)),
            intensity: Some(Intensity::Medium),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportDraft {
    #[serde(deserialize_with = "lenient")]
    pub level: Option<SportLevel>,
    #[serde(deserialize_with = "lenient")]
    pub plan_choice: Option<PlanChoice>,
    #[serde(alias = "ownBlocks")]
    pub own_blocks: Vec<SportBlock>,
    /// Distinct sport ids of `own_blocks`, in block order.
    #[serde(alias = "pickedOwn")]
    pub picked_own: Vec<String>,
    #[serde(alias = "mainSportOwn")]
    pub main_sport_own: Option<String>,
    /// Interest tags, only meaningful when `level` is `none`.
    #[serde(alias = "futureMulti")]
    pub future_multi: Vec<String>,
    pub future_text: String,
}

// =========================
// Steps 4-6: Nutrition
// =========================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Diet {
    #[default]
    #[serde(alias = "none")]
    NoRestrictions,
    Vegetarian,
    Vegan,
    Pescatarian,
    GlutenFree,
    LactoseFree,
    LowCarb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MealRepeats {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowGrams {
    Yes,
    No,
}

/// Macronutrient split in percent (carbs / fat / protein).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    pub c: NumberInput,
    pub f: NumberInput,
    pub p: NumberInput,
}

impl Macros {
    pub fn new(c: f64, f: f64, p: f64) -> Self {
        Self {
            c: NumberInput::from(c),
            f: NumberInput::from(f),
            p: NumberInput::from(p),
        }
    }

    /// Numeric equality, so `"55"` and `55` compare equal.
    pub fn same_split(&self, other: &Macros) -> bool {
        let eq = |a: &NumberInput, b: &NumberInput| match (a.value(), b.value()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => false,
        };
        eq(&self.c, &other.c) && eq(&self.f, &other.f) && eq(&self.p, &other.p)
    }
}

impl Default for Macros {
    fn default() -> Self {
        Macros::new(55.0, 25.0, 20.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Nutrition {
    #[serde(deserialize_with = "lenient")]
    pub diet: Option<Diet>,
    pub dislikes: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub repeats: Option<MealRepeats>,
    #[serde(deserialize_with = "lenient")]
    pub show_grams: Option<ShowGrams>,
    pub macros: Macros,
    /// Derived: macros differ from the catalog/default split.
    #[serde(alias = "_customized")]
    pub customized: bool,
}

impl Default for Nutrition {
    fn default() -> Self {
        Self {
            diet: Some(Diet::NoRestrictions),
            dislikes: Vec::new(),
            repeats: Some(MealRepeats::Two),
            show_grams: None,
            macros: Macros::default(),
            customized: false,
        }
    }
}

// =========================
// Step 7: Plan
// =========================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanVariant {
    #[default]
    Standard,
    Premium,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanPeriod {
    #[default]
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "CZK")]
    Czk,
    #[serde(rename = "EUR")]
    Eur,
}

/// Quoted price, amounts in minor units (haléře / cents).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPrice {
    pub czk: i64,
    pub eur: i64,
    pub currency: Currency,
    /// Price after discount, in `currency`.
    #[serde(rename = "final")]
    pub final_amount: i64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanDraft {
    #[serde(deserialize_with = "lenient")]
    pub variant: Option<PlanVariant>,
    #[serde(deserialize_with = "lenient")]
    pub period: Option<PlanPeriod>,
    /// Derived from nutrition choices, never set by the user.
    #[serde(alias = "autoPremium")]
    pub auto_premium: bool,
    #[serde(deserialize_with = "lenient")]
    pub price: Option<PlanPrice>,
    pub discount_code: Option<String>,
    pub discount_percent: Option<u8>,
}

impl Default for PlanDraft {
    fn default() -> Self {
        Self {
            variant: Some(PlanVariant::Standard),
            period: Some(PlanPeriod::Week),
            auto_premium: false,
            price: None,
            discount_code: None,
            discount_percent: None,
        }
    }
}

// =========================
// Step 8: Customer & consents
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(alias = "newsletter_opt_in")]
    pub newsletter: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Consents {
    pub terms: bool,
    pub privacy: bool,
}

// =========================
// Aggregate root
// =========================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormDraft {
    pub profile: Profile,
    pub goal: Goal,
    pub sport: SportDraft,
    pub nutrition: Nutrition,
    pub plan: PlanDraft,
    pub customer: Customer,
    pub consents: Consents,
}
