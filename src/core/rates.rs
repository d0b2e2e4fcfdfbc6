//! Fixed-rate mortgage and discounting primitives. Everything here is a
//! closed-form scalar function; the engine owns schedule construction.

/// Standard repayment-mortgage monthly payment. A zero rate is handled
/// explicitly as straight-line repayment; callers must guarantee years > 0.
pub fn monthly_payment(principal: f64, annual_rate: f64, years: u32) -> f64 {
    let months = (years * 12) as f64;
    if annual_rate == 0.0 {
        return principal / months;
    }
    let monthly_rate = annual_rate / 12.0;
    let growth = (1.0 + monthly_rate).powf(months);
    principal * monthly_rate * growth / (growth - 1.0)
}

/// Closed-form annuity balance after `months_paid` months. Callers clamp
/// `months_paid` to [0, years*12]; values outside that range are undefined.
pub fn remaining_balance(principal: f64, annual_rate: f64, years: u32, months_paid: u32) -> f64 {
    let total_months = (years * 12) as f64;
    let paid = months_paid as f64;
    if annual_rate == 0.0 {
        return principal * (1.0 - paid / total_months);
    }
    let monthly_rate = annual_rate / 12.0;
    let growth_full = (1.0 + monthly_rate).powf(total_months);
    let growth_paid = (1.0 + monthly_rate).powf(paid);
    principal * (growth_full - growth_paid) / (growth_full - 1.0)
}

/// Present value of period-indexed cash flows at a constant periodic rate.
/// Index 0 is time 0 and is not discounted.
pub fn present_value(rate: f64, cashflows: &[f64]) -> f64 {
    cashflows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum()
}
