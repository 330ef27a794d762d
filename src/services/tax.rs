//! Indian personal income tax (TDS) for salary slips, FY 2025-26 tables.

use serde::{Deserialize, Serialize};

pub const CESS_PERCENT: f64 = 4.0;
pub const SECTION_80C_CAP: f64 = 150_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxRegime {
    Old,
    New,
}

impl TaxRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxRegime::Old => "old",
            TaxRegime::New => "new",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "old" => Some(TaxRegime::Old),
            "new" => Some(TaxRegime::New),
            _ => None,
        }
    }

    fn rules(&self) -> &'static RegimeRules {
        match self {
            TaxRegime::Old => &OLD_REGIME,
            TaxRegime::New => &NEW_REGIME,
        }
    }
}

/// Lower bound of the slab and the percentage applied to income above it.
struct Slab {
    from: f64,
    percent: f64,
}

struct RegimeRules {
    standard_deduction: f64,
    allows_80c: bool,
    slabs: &'static [Slab],
    rebate_threshold: f64,
    rebate_cap: f64,
    marginal_relief: bool,
}

static NEW_REGIME: RegimeRules = RegimeRules {
    standard_deduction: 75_000.0,
    allows_80c: false,
    slabs: &[
        Slab { from: 0.0, percent: 0.0 },
        Slab { from: 400_000.0, percent: 5.0 },
        Slab { from: 800_000.0, percent: 10.0 },
        Slab { from: 1_200_000.0, percent: 15.0 },
        Slab { from: 1_600_000.0, percent: 20.0 },
        Slab { from: 2_000_000.0, percent: 25.0 },
        Slab { from: 2_400_000.0, percent: 30.0 },
    ],
    rebate_threshold: 1_200_000.0,
    rebate_cap: 60_000.0,
    marginal_relief: true,
};

static OLD_REGIME: RegimeRules = RegimeRules {
    standard_deduction: 50_000.0,
    allows_80c: true,
    slabs: &[
        Slab { from: 0.0, percent: 0.0 },
        Slab { from: 250_000.0, percent: 5.0 },
        Slab { from: 500_000.0, percent: 20.0 },
        Slab { from: 1_000_000.0, percent: 30.0 },
    ],
    rebate_threshold: 500_000.0,
    rebate_cap: 12_500.0,
    marginal_relief: false,
};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum TaxError {
    #[error("{field} must be a finite, non-negative amount")]
    InvalidInput { field: &'static str },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub regime: TaxRegime,
    pub gross_annual: f64,
    pub standard_deduction: f64,
    pub section_80c: f64,
    pub taxable_income: f64,
    pub slab_tax: f64,
    pub rebate: f64,
    pub cess: f64,
    pub annual_tax: f64,
    pub monthly_tds: f64,
}

fn check(field: &'static str, value: f64) -> Result<(), TaxError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TaxError::InvalidInput { field });
    }
    Ok(())
}

fn slab_tax(slabs: &[Slab], taxable: f64) -> f64 {
    slabs
        .iter()
        .enumerate()
        .map(|(i, slab)| {
            let upper = slabs.get(i + 1).map_or(f64::INFINITY, |next| next.from);
            let portion = taxable.min(upper) - slab.from;
            if portion > 0.0 {
                portion * slab.percent / 100.0
            } else {
                0.0
            }
        })
        .sum()
}

/// Annual tax for a gross annual salary. `declared_80c` is ignored under the
/// new regime and capped at [`SECTION_80C_CAP`] under the old one.
pub fn annual_tax(
    gross_annual: f64,
    regime: TaxRegime,
    declared_80c: f64,
) -> Result<TaxBreakdown, TaxError> {
    check("gross_annual", gross_annual)?;
    check("declared_80c", declared_80c)?;

    let rules = regime.rules();
    let standard_deduction = rules.standard_deduction.min(gross_annual);
    let section_80c = if rules.allows_80c {
        declared_80c.min(SECTION_80C_CAP).min(gross_annual - standard_deduction)
    } else {
        0.0
    };
    let taxable_income = (gross_annual - standard_deduction - section_80c).max(0.0);

    let slab_tax = slab_tax(rules.slabs, taxable_income);
    let rebate = if taxable_income <= rules.rebate_threshold {
        slab_tax.min(rules.rebate_cap)
    } else if rules.marginal_relief {
        // tax above the threshold may not exceed the income above it
        (slab_tax - (taxable_income - rules.rebate_threshold)).max(0.0)
    } else {
        0.0
    };
    let after_rebate = slab_tax - rebate;
    let cess = after_rebate * CESS_PERCENT / 100.0;
    let annual_tax = (after_rebate + cess).round();

    Ok(TaxBreakdown {
        regime,
        gross_annual,
        standard_deduction,
        section_80c,
        taxable_income,
        slab_tax,
        rebate,
        cess,
        annual_tax,
        monthly_tds: (annual_tax / 12.0).round(),
    })
}

/// Monthly withholding in whole rupees.
pub fn monthly_tds(gross_annual: f64, regime: TaxRegime, declared_80c: f64) -> Result<f64, TaxError> {
    annual_tax(gross_annual, regime, declared_80c).map(|b| b.monthly_tds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new(gross: f64) -> TaxBreakdown {
        annual_tax(gross, TaxRegime::New, 0.0).unwrap()
    }

    fn old(gross: f64, c80: f64) -> TaxBreakdown {
        annual_tax(gross, TaxRegime::Old, c80).unwrap()
    }

    #[test]
    fn new_regime_is_zero_up_to_rebate_threshold() {
        // 12.75L gross less 75k standard deduction is exactly 12L taxable
        let t = new(1_275_000.0);
        assert_eq!(t.taxable_income, 1_200_000.0);
        assert_eq!(t.slab_tax, 60_000.0);
        assert_eq!(t.annual_tax, 0.0);
    }

    #[test]
    fn new_regime_marginal_relief_just_above_threshold() {
        // 10k over the threshold: slab tax 61.5k, payable capped at 10k + cess
        let t = new(1_285_000.0);
        assert_eq!(t.taxable_income, 1_210_000.0);
        assert_eq!(t.slab_tax, 61_500.0);
        assert_eq!(t.annual_tax, 10_400.0);
    }

    #[test]
    fn new_regime_without_relief_at_high_income() {
        // taxable 25L: 20k + 40k + 60k + 80k + 100k + 30k = 330k
        let t = new(2_575_000.0);
        assert_eq!(t.taxable_income, 2_500_000.0);
        assert_eq!(t.slab_tax, 330_000.0);
        assert_eq!(t.rebate, 0.0);
        assert_eq!(t.annual_tax, 343_200.0);
        assert_eq!(t.monthly_tds, 28_600.0);
    }

    #[test]
    fn new_regime_ignores_80c() {
        let with = annual_tax(2_000_000.0, TaxRegime::New, 150_000.0).unwrap();
        assert_eq!(with.section_80c, 0.0);
        assert_eq!(with.annual_tax, new(2_000_000.0).annual_tax);
    }

    #[test]
    fn old_regime_rebate_at_five_lakh() {
        let t = old(550_000.0, 0.0);
        assert_eq!(t.taxable_income, 500_000.0);
        assert_eq!(t.slab_tax, 12_500.0);
        assert_eq!(t.annual_tax, 0.0);
    }

    #[test]
    fn old_regime_has_no_marginal_relief() {
        // taxable 5.1L: 12.5k + 2k = 14.5k, + 4% cess
        let t = old(560_000.0, 0.0);
        assert_eq!(t.rebate, 0.0);
        assert_eq!(t.annual_tax, 15_080.0);
    }

    #[test]
    fn old_regime_caps_80c() {
        let t = old(1_200_000.0, 400_000.0);
        assert_eq!(t.section_80c, SECTION_80C_CAP);
        // taxable 10L: 12.5k + 100k = 112.5k, + cess = 117k
        assert_eq!(t.taxable_income, 1_000_000.0);
        assert_eq!(t.annual_tax, 117_000.0);
        assert_eq!(t.monthly_tds, 9_750.0);
    }

    #[test]
    fn deductions_never_push_taxable_below_zero() {
        let t = old(30_000.0, 100_000.0);
        assert_eq!(t.standard_deduction, 30_000.0);
        assert_eq!(t.section_80c, 0.0);
        assert_eq!(t.taxable_income, 0.0);
        assert_eq!(t.annual_tax, 0.0);
    }

    #[test]
    fn rejects_negative_and_non_finite_input() {
        assert_eq!(
            annual_tax(-1.0, TaxRegime::New, 0.0),
            Err(TaxError::InvalidInput { field: "gross_annual" })
        );
        assert_eq!(
            annual_tax(100.0, TaxRegime::Old, f64::NAN),
            Err(TaxError::InvalidInput { field: "declared_80c" })
        );
    }

    #[test]
    fn regime_parses_from_storage_form() {
        assert_eq!(TaxRegime::parse("old"), Some(TaxRegime::Old));
        assert_eq!(TaxRegime::parse(TaxRegime::New.as_str()), Some(TaxRegime::New));
        assert_eq!(TaxRegime::parse("legacy"), None);
    }
}
