use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::tax::{self, TaxError, TaxRegime};

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum PayrollError {
    #[error("{0} must be a finite, non-negative amount")]
    InvalidAmount(String),
    #[error("deductions ({deductions}) and tax ({tax}) exceed gross pay ({gross})")]
    NegativeNetPay { gross: f64, tax: f64, deductions: f64 },
    #[error(transparent)]
    Tax(#[from] TaxError),
}

/// Monthly earnings of a salary structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Earnings {
    pub basic: f64,
    pub hra: f64,
    pub special_allowance: f64,
    pub other_allowances: f64,
}

impl Earnings {
    pub fn gross(&self) -> f64 {
        self.basic + self.hra + self.special_allowance + self.other_allowances
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct Deduction {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlipFigures {
    pub gross: f64,
    pub tax: f64,
    pub total_deductions: f64,
    pub net_pay: f64,
}

fn check_amount(name: &str, value: f64) -> Result<(), PayrollError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PayrollError::InvalidAmount(name.to_string()));
    }
    Ok(())
}

/// `net_pay = gross - tax - deductions`, tax being the monthly TDS on the
/// annualised gross.
pub fn compute_slip(
    earnings: &Earnings,
    regime: TaxRegime,
    declared_80c: f64,
    deductions: &[Deduction],
) -> Result<SlipFigures, PayrollError> {
    check_amount("basic", earnings.basic)?;
    check_amount("hra", earnings.hra)?;
    check_amount("special_allowance", earnings.special_allowance)?;
    check_amount("other_allowances", earnings.other_allowances)?;
    for deduction in deductions {
        check_amount(&deduction.name, deduction.amount)?;
    }

    let gross = earnings.gross();
    let tax = tax::monthly_tds(gross * 12.0, regime, declared_80c)?;
    let total_deductions: f64 = deductions.iter().map(|d| d.amount).sum();
    let net_pay = gross - tax - total_deductions;
    if net_pay < 0.0 {
        return Err(PayrollError::NegativeNetPay { gross, tax, deductions: total_deductions });
    }

    Ok(SlipFigures { gross, tax, total_deductions, net_pay })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earnings(basic: f64) -> Earnings {
        Earnings { basic, hra: basic * 0.4, special_allowance: 10_000.0, other_allowances: 0.0 }
    }

    #[test]
    fn net_is_gross_minus_tax_and_deductions() {
        // 1.5L monthly = 18L annual, new regime
        let e = Earnings { basic: 100_000.0, hra: 40_000.0, special_allowance: 10_000.0, other_allowances: 0.0 };
        let deductions = vec![
            Deduction { name: "PF".into(), amount: 1_800.0 },
            Deduction { name: "Professional tax".into(), amount: 200.0 },
        ];
        let figures = compute_slip(&e, TaxRegime::New, 0.0, &deductions).unwrap();
        let expected_tax = tax::monthly_tds(1_800_000.0, TaxRegime::New, 0.0).unwrap();
        assert_eq!(figures.gross, 150_000.0);
        assert_eq!(figures.tax, expected_tax);
        assert_eq!(figures.total_deductions, 2_000.0);
        assert_eq!(figures.net_pay, 150_000.0 - expected_tax - 2_000.0);
    }

    #[test]
    fn income_under_rebate_pays_no_tax() {
        let figures = compute_slip(&earnings(50_000.0), TaxRegime::New, 0.0, &[]).unwrap();
        assert_eq!(figures.tax, 0.0);
        assert_eq!(figures.net_pay, figures.gross);
    }

    #[test]
    fn negative_net_pay_is_rejected() {
        let deductions = vec![Deduction { name: "Advance".into(), amount: 1_000_000.0 }];
        assert!(matches!(
            compute_slip(&earnings(20_000.0), TaxRegime::Old, 0.0, &deductions),
            Err(PayrollError::NegativeNetPay { .. })
        ));
    }

    #[test]
    fn negative_components_are_rejected() {
        let mut e = earnings(20_000.0);
        e.hra = -1.0;
        assert_eq!(
            compute_slip(&e, TaxRegime::Old, 0.0, &[]),
            Err(PayrollError::InvalidAmount("hra".into()))
        );
    }
}
