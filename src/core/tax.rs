//! UK tax policy: progressive income tax with the tapered personal
//! allowance, SDLT bands with first-time-buyer relief and the
//! additional-property/company surcharge, and the flat corporation-tax rate
//! applied to company-held rental profit.

use super::types::BuyerType;

pub const PERSONAL_ALLOWANCE: f64 = 12_570.0;
pub const CORPORATION_TAX_RATE: f64 = 0.19;

const ALLOWANCE_TAPER_START: f64 = 100_000.0;
const ADDITIONAL_RATE_THRESHOLD: f64 = 125_140.0;
const BASIC_BAND_WIDTH: f64 = 37_700.0;
const BASIC_RATE: f64 = 0.20;
const HIGHER_RATE: f64 = 0.40;
const ADDITIONAL_RATE: f64 = 0.45;

// SDLT band upper bounds and the rate on the slice below each bound.
const SDLT_BANDS: [(f64, f64); 5] = [
    (125_000.0, 0.0),
    (250_000.0, 0.02),
    (925_000.0, 0.05),
    (1_500_000.0, 0.10),
    (f64::INFINITY, 0.12),
];

const FTB_RELIEF_PRICE_CAP: f64 = 500_000.0;
const FTB_NIL_BAND: f64 = 300_000.0;
const FTB_RATE: f64 = 0.05;
const SURCHARGE_RATE: f64 = 0.05;

/// Progressive income tax on a full year's income. The personal allowance
/// is reduced by £1 per £2 of income above £100,000 and is gone at
/// £125,140; band widths are measured in taxable income net of whatever
/// allowance survives. Non-finite or non-positive income is taxed at zero.
pub fn income_tax(income: f64) -> f64 {
    if !income.is_finite() || income <= 0.0 {
        return 0.0;
    }

    let mut allowance = PERSONAL_ALLOWANCE;
    if income > ALLOWANCE_TAPER_START {
        let reduction = (income - ALLOWANCE_TAPER_START) / 2.0;
        allowance = (allowance - reduction).max(0.0);
    }

    let taxable = (income - allowance).max(0.0);
    let basic_taxable = taxable.min(BASIC_BAND_WIDTH);
    let higher_band_width = (ADDITIONAL_RATE_THRESHOLD - allowance - BASIC_BAND_WIDTH).max(0.0);
    let higher_taxable = (taxable - basic_taxable).min(higher_band_width).max(0.0);
    let additional_taxable = (taxable - basic_taxable - higher_taxable).max(0.0);

    basic_taxable * BASIC_RATE + higher_taxable * HIGHER_RATE + additional_taxable * ADDITIONAL_RATE
}

/// Tax attributable to an income slice on top of a base income. This is the
/// marginal calculator the projection uses to isolate the tax caused by one
/// owner's share of rental profit.
pub fn marginal_income_tax(base_income: f64, slice: f64) -> f64 {
    if !slice.is_finite() || slice <= 0.0 {
        return 0.0;
    }
    income_tax(base_income.max(0.0) + slice) - income_tax(base_income)
}

/// Stamp duty on a purchase. First-time-buyer relief applies only to an
/// individual with no existing properties buying at or under £500,000;
/// otherwise banded rates apply, plus a flat 5% of the entire price for a
/// company buyer or an individual who already owns two or more properties.
pub fn stamp_duty(
    price: f64,
    buyer_type: BuyerType,
    properties_owned: u32,
    first_time_buyer: bool,
) -> f64 {
    if !price.is_finite() || price <= 0.0 {
        return 0.0;
    }

    if buyer_type == BuyerType::Individual
        && properties_owned == 0
        && first_time_buyer
        && price <= FTB_RELIEF_PRICE_CAP
    {
        return (price - FTB_NIL_BAND).max(0.0) * FTB_RATE;
    }

    let mut duty = 0.0;
    let mut band_floor = 0.0;
    for (band_ceiling, rate) in SDLT_BANDS {
        if price <= band_floor {
            break;
        }
        duty += (price.min(band_ceiling) - band_floor) * rate;
        band_floor = band_ceiling;
    }

    let surcharged = buyer_type == BuyerType::Company
        || (buyer_type == BuyerType::Individual && properties_owned >= 2);
    if surcharged {
        duty += price * SURCHARGE_RATE;
    }

    duty
}
