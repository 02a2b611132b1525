// Plan pricing
//
// Amounts are kept in minor units (haléře / euro cents) so discounts never accumulate float
// error. The display currency follows the UI language: Czech pays in CZK, everyone else in EUR.

use crate::models::draft::{Currency, PlanDraft, PlanPeriod, PlanPrice, PlanVariant};

/// List price in minor units as `(czk, eur)`.
pub fn list_price(variant: PlanVariant, period: PlanPeriod) -> (i64, i64) {
    match (variant, period) {
        (PlanVariant::Standard, PlanPeriod::Week) => (199_000, 8_490),
        (PlanVariant::Standard, PlanPeriod::Month) => (699_000, 28_990),
        (PlanVariant::Premium, PlanPeriod::Week) => (299_000, 12_490),
        (PlanVariant::Premium, PlanPeriod::Month) => (999_000, 39_990),
    }
}

pub fn currency_for_lang(lang: &str) -> Currency {
    if lang.eq_ignore_ascii_case("cs") {
        Currency::Czk
    } else {
        Currency::Eur
    }
}

/// `€84.90` / `1990 Kč` (haléře shown only when non-zero).
pub fn format_price(amount_minor: i64, currency: Currency) -> String {
    let major = amount_minor / 100;
    let minor = (amount_minor % 100).abs();
    match currency {
        Currency::Eur => format!("€{}.{:02}", major, minor),
        Currency::Czk if minor == 0 => format!("{} Kč", major),
        Currency::Czk => format!("{}.{:02} Kč", major, minor),
    }
}

/// Known discount codes (case-insensitive, surrounding whitespace ignored).
pub fn discount_percent(code: &str) -> Option<u8> {
    match code.trim().to_ascii_uppercase().as_str() {
        "FIT10" => Some(10),
        "VIP20" => Some(20),
        _ => None,
    }
}

pub fn apply_discount(amount_minor: i64, percent: u8) -> i64 {
    let percent = i64::from(percent.min(100));
    // Round half up in minor units.
    (amount_minor * (100 - percent) + 50) / 100
}

/// Price quote for a plan selection in the currency of `lang`.
pub fn quote(
    variant: PlanVariant,
    period: PlanPeriod,
    lang: &str,
    discount: Option<u8>,
) -> PlanPrice {
    let (czk, eur) = list_price(variant, period);
    let currency = currency_for_lang(lang);
    let base = match currency {
        Currency::Czk => czk,
        Currency::Eur => eur,
    };
    let final_amount = discount.map_or(base, |pct| apply_discount(base, pct));
    PlanPrice {
        czk,
        eur,
        currency,
        final_amount,
        formatted: format_price(final_amount, currency),
    }
}

impl PlanDraft {
    /// Recompute `price` from the current selection. Without a full selection there is no
    /// price.
    pub fn refresh_price(&mut self, lang: &str) {
        self.price = match (self.variant, self.period) {
            (Some(variant), Some(period)) => {
                Some(quote(variant, period, lang, self.discount_percent))
            }
            _ => None,
        };
    }

    /// Apply a discount code. An unknown code clears any previous discount. Returns the
    /// applied percentage.
    pub fn apply_discount_code(&mut self, code: &str, lang: &str) -> Option<u8> {
        match discount_percent(code) {
            Some(pct) => {
                self.discount_code = Some(code.trim().to_ascii_uppercase());
                self.discount_percent = Some(pct);
            }
            None => {
                self.discount_code = None;
                self.discount_percent = None;
            }
        }
        self.refresh_price(lang);
        self.discount_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_follows_language() {
        let cs = quote(PlanVariant::Standard, PlanPeriod::Week, "cs", None);
        assert_eq!(cs.currency, Currency::Czk);
        assert_eq!(cs.formatted, "1990 Kč");

        let en = quote(PlanVariant::Standard, PlanPeriod::Week, "en", None);
        assert_eq!(en.currency, Currency::Eur);
        assert_eq!(en.formatted, "€84.90");
        assert_eq!(en.final_amount, 8_490);
    }

    #[test]
    fn premium_month_prices() {
        let sk = quote(PlanVariant::Premium, PlanPeriod::Month, "sk", None);
        assert_eq!(sk.formatted, "€399.90");
        assert_eq!(sk.czk, 999_000);
    }

    #[test]
    fn discount_codes_are_normalized() {
        assert_eq!(discount_percent(" fit10 "), Some(10));
        assert_eq!(discount_percent("VIP20"), Some(20));
        assert_eq!(discount_percent("FREE"), None);
    }

    #[test]
    fn discounted_quote() {
        let en = quote(PlanVariant::Standard, PlanPeriod::Week, "en", Some(10));
        assert_eq!(en.final_amount, 7_641);
        assert_eq!(en.formatted, "€76.41");

        let cs = quote(PlanVariant::Premium, PlanPeriod::Week, "cs", Some(20));
        assert_eq!(cs.formatted, "2392 Kč");
    }

    #[test]
    fn invalid_code_clears_discount() {
        let mut plan = PlanDraft::default();
        assert_eq!(plan.apply_discount_code("vip20", "en"), Some(20));
        assert_eq!(plan.discount_code.as_deref(), Some("VIP20"));
        assert_eq!(plan.price.as_ref().map(|p| p.final_amount), Some(6_792));

        assert_eq!(plan.apply_discount_code("nope", "en"), None);
        assert_eq!(plan.discount_code, None);
        assert_eq!(plan.price.as_ref().map(|p| p.final_amount), Some(8_490));
    }

    #[test]
    fn fractional_crowns_keep_hellers() {
        assert_eq!(format_price(179_150, Currency::Czk), "1791.50 Kč");
    }
}
