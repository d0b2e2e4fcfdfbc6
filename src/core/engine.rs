use super::rates::{monthly_payment, present_value};
use super::score::{ScoreMetrics, composite_score};
use super::tax::{CORPORATION_TAX_RATE, marginal_income_tax, stamp_duty};
use super::types::{BuyerType, DealInputs, DealSummary, LoanType, YearlyLedgerEntry};

/// Per-year view of the monthly amortization schedule.
#[derive(Debug, Clone, Copy)]
struct DebtYear {
    debt_service: f64,
    interest_paid: f64,
    closing_balance: f64,
}

/// Running totals carried across the year loop.
#[derive(Debug, Default)]
struct CarryState {
    cumulative_pre_tax: f64,
    cumulative_after_tax: f64,
    total_property_tax: f64,
    total_reinvested: f64,
    reinvestment_fund: f64,
}

/// Acquisition-time figures derived once before the loop runs.
#[derive(Debug, Clone, Copy)]
struct Acquisition {
    deposit: f64,
    loan: f64,
    stamp_duty: f64,
    total_closing_costs: f64,
    cash_invested: f64,
    project_cost: f64,
}

fn acquisition_figures(inputs: &DealInputs) -> Acquisition {
    let price = inputs.purchase_price;
    let deposit = price * inputs.deposit_pct;
    let loan = (price * (1.0 - inputs.deposit_pct)).max(0.0);
    let duty = stamp_duty(
        price,
        inputs.buyer_type,
        inputs.properties_owned,
        inputs.first_time_buyer,
    );
    let total_closing_costs = price * inputs.closing_costs_pct + duty;
    let cash_invested = deposit + total_closing_costs + inputs.renovation_cost;
    Acquisition {
        deposit,
        loan,
        stamp_duty: duty,
        total_closing_costs,
        cash_invested,
        project_cost: price + total_closing_costs + inputs.renovation_cost,
    }
}

/// Builds the per-year debt schedule for years 1..=exit_year. Repayment
/// loans amortize monthly and stop once the balance hits zero or the term
/// ends; interest-only loans keep the full balance outstanding until sale.
fn annual_debt_schedule(inputs: &DealInputs, loan: f64) -> Vec<DebtYear> {
    let years = inputs.exit_year as usize;
    let monthly_rate = inputs.interest_rate / 12.0;

    if loan <= 0.0 {
        return vec![
            DebtYear {
                debt_service: 0.0,
                interest_paid: 0.0,
                closing_balance: 0.0,
            };
            years
        ];
    }

    match inputs.loan_type {
        LoanType::InterestOnly => {
            let interest = loan * monthly_rate * 12.0;
            vec![
                DebtYear {
                    debt_service: interest,
                    interest_paid: interest,
                    closing_balance: loan,
                };
                years
            ]
        }
        LoanType::Repayment => {
            let payment = monthly_payment(loan, inputs.interest_rate, inputs.mortgage_years);
            let term_months = inputs.mortgage_years * 12;
            let mut balance = loan;
            let mut schedule = Vec::with_capacity(years);

            for year in 0..years {
                let mut debt_service = 0.0;
                let mut interest_paid = 0.0;
                for month in 1..=12 {
                    let months_elapsed = year as u32 * 12 + month;
                    if months_elapsed > term_months || balance <= 0.0 {
                        break;
                    }
                    let interest = balance * monthly_rate;
                    let principal = (payment - interest).min(balance);
                    balance -= principal;
                    debt_service += interest + principal;
                    interest_paid += interest;
                }
                schedule.push(DebtYear {
                    debt_service,
                    interest_paid,
                    closing_balance: balance.max(0.0),
                });
            }
            schedule
        }
    }
}

/// Ownership weights normalized to sum to one; a degenerate zero/zero pair
/// falls back to an equal split.
fn normalized_shares(inputs: &DealInputs) -> (f64, f64) {
    let s1 = inputs.ownership_share_1.max(0.0);
    let s2 = inputs.ownership_share_2.max(0.0);
    let total = s1 + s2;
    if total <= 0.0 {
        (0.5, 0.5)
    } else {
        (s1 / total, s2 / total)
    }
}

/// Tax on one year's rental profit. Capital repayment is not deductible, so
/// the caller passes NOI minus interest. Losses carry no relief: a
/// non-positive profit is taxed at zero for both buyer types.
fn property_tax_for_year(inputs: &DealInputs, shares: (f64, f64), taxable_profit: f64) -> f64 {
    if !taxable_profit.is_finite() || taxable_profit <= 0.0 {
        return 0.0;
    }
    match inputs.buyer_type {
        BuyerType::Company => taxable_profit * CORPORATION_TAX_RATE,
        BuyerType::Individual => {
            marginal_income_tax(inputs.income_person_1, taxable_profit * shares.0)
                + marginal_income_tax(inputs.income_person_2, taxable_profit * shares.1)
        }
    }
}

/// Runs the full projection: amortization, per-year tax, reinvestment,
/// index-fund comparison, terminal sale, NPV and the composite score.
/// Pure and synchronous; identical inputs always produce identical output.
pub fn analyze_deal(inputs: &DealInputs) -> DealSummary {
    let price = inputs.purchase_price;
    let acq = acquisition_figures(inputs);
    let schedule = annual_debt_schedule(inputs, acq.loan);
    let shares = normalized_shares(inputs);
    let reinvest_pct = inputs.reinvest_pct.clamp(0.0, 1.0);
    let reinvest_enabled = inputs.reinvest_income && reinvest_pct > 0.0;

    let monthly_mortgage_payment = if acq.loan <= 0.0 {
        0.0
    } else {
        match inputs.loan_type {
            LoanType::Repayment => {
                monthly_payment(acq.loan, inputs.interest_rate, inputs.mortgage_years)
            }
            LoanType::InterestOnly => acq.loan * inputs.interest_rate / 12.0,
        }
    };

    let mut carry = CarryState::default();
    let mut ledger = Vec::with_capacity(inputs.exit_year as usize + 1);
    let mut npv_flows = Vec::with_capacity(inputs.exit_year as usize + 1);
    npv_flows.push(-acq.cash_invested);

    let baseline_net_equity = price * (1.0 - inputs.selling_costs_pct) - acq.loan;
    ledger.push(YearlyLedgerEntry {
        year: 0,
        gross_rent: 0.0,
        operating_expenses: 0.0,
        noi: 0.0,
        debt_service: 0.0,
        interest_paid: 0.0,
        pre_tax_cash_flow: 0.0,
        property_tax: 0.0,
        after_tax_cash_flow: 0.0,
        cumulative_pre_tax_cash: 0.0,
        cumulative_after_tax_cash: 0.0,
        reinvestment_fund_balance: 0.0,
        property_market_value: price,
        remaining_loan_balance: acq.loan,
        index_fund_balance: acq.cash_invested,
        gross_wealth_pre_tax: price,
        gross_wealth_after_tax: price,
        net_wealth_pre_tax: baseline_net_equity,
        net_wealth_after_tax: baseline_net_equity,
    });

    for year in 1..=inputs.exit_year {
        let annual_rent =
            inputs.monthly_rent * 12.0 * (1.0 + inputs.rent_growth).powi(year as i32 - 1);
        let gross_rent = annual_rent * (1.0 - inputs.vacancy_pct);
        let operating_expenses = gross_rent * (inputs.mgmt_pct + inputs.repairs_pct)
            + inputs.insurance_per_year
            + inputs.other_opex_per_year;
        let noi = gross_rent - operating_expenses;

        let debt = schedule[year as usize - 1];
        let pre_tax_cash_flow = noi - debt.debt_service;
        carry.cumulative_pre_tax += pre_tax_cash_flow;

        let taxable_profit = noi - debt.interest_paid;
        let property_tax = property_tax_for_year(inputs, shares, taxable_profit);
        carry.total_property_tax += property_tax;
        let after_tax_cash_flow = pre_tax_cash_flow - property_tax;
        carry.cumulative_after_tax += after_tax_cash_flow;

        let contribution = if reinvest_enabled {
            reinvest_pct * after_tax_cash_flow.max(0.0)
        } else {
            0.0
        };
        carry.reinvestment_fund =
            carry.reinvestment_fund * (1.0 + inputs.index_fund_growth) + contribution;
        carry.total_reinvested += contribution;
        let net_cumulative_after_tax = carry.cumulative_after_tax - carry.total_reinvested;

        let market_value = price * (1.0 + inputs.annual_appreciation).powi(year as i32);
        let net_sale_if_sold = market_value * (1.0 - inputs.selling_costs_pct)
            - debt.closing_balance;
        let index_fund_balance =
            acq.cash_invested * (1.0 + inputs.index_fund_growth).powi(year as i32);

        if year == inputs.exit_year {
            npv_flows.push(after_tax_cash_flow + net_sale_if_sold);
        } else {
            npv_flows.push(after_tax_cash_flow);
        }

        ledger.push(YearlyLedgerEntry {
            year,
            gross_rent,
            operating_expenses,
            noi,
            debt_service: debt.debt_service,
            interest_paid: debt.interest_paid,
            pre_tax_cash_flow,
            property_tax,
            after_tax_cash_flow,
            cumulative_pre_tax_cash: carry.cumulative_pre_tax,
            cumulative_after_tax_cash: net_cumulative_after_tax,
            reinvestment_fund_balance: carry.reinvestment_fund,
            property_market_value: market_value,
            remaining_loan_balance: debt.closing_balance,
            index_fund_balance,
            gross_wealth_pre_tax: market_value + carry.cumulative_pre_tax,
            gross_wealth_after_tax: market_value
                + net_cumulative_after_tax
                + carry.reinvestment_fund,
            net_wealth_pre_tax: net_sale_if_sold + carry.cumulative_pre_tax,
            net_wealth_after_tax: net_sale_if_sold
                + net_cumulative_after_tax
                + carry.reinvestment_fund,
        });
    }

    let year_1 = &ledger[1];
    let noi_year_1 = year_1.noi;
    let cash_flow_year_1 = year_1.pre_tax_cash_flow;
    let cap_rate = noi_year_1 / price;
    let cash_on_cash = cash_flow_year_1 / acq.cash_invested;
    let dscr_year_1 = if year_1.debt_service == 0.0 {
        0.0
    } else {
        noi_year_1 / year_1.debt_service
    };
    let yield_on_cost = noi_year_1 / acq.project_cost;

    let last = ledger
        .last()
        .expect("ledger always has a baseline entry");
    let remaining_loan_at_exit = last.remaining_loan_balance;
    let future_property_value = last.property_market_value;
    let net_sale_proceeds =
        future_property_value * (1.0 - inputs.selling_costs_pct) - remaining_loan_at_exit;
    let final_index_fund = last.index_fund_balance;
    let npv = present_value(inputs.discount_rate, &npv_flows);

    let score = composite_score(ScoreMetrics {
        cash_on_cash,
        cap_rate,
        dscr: dscr_year_1,
        npv,
        cash_flow_year_1,
    });

    DealSummary {
        deposit: acq.deposit,
        stamp_duty: acq.stamp_duty,
        total_closing_costs: acq.total_closing_costs,
        total_cash_invested: acq.cash_invested,
        loan_amount: acq.loan,
        monthly_mortgage_payment,
        noi_year_1,
        cash_flow_year_1,
        cap_rate,
        cash_on_cash,
        dscr_year_1,
        yield_on_cost,
        remaining_loan_at_exit,
        future_property_value,
        net_sale_proceeds,
        npv,
        score,
        total_property_tax: carry.total_property_tax,
        total_reinvested: carry.total_reinvested,
        final_reinvestment_fund: carry.reinvestment_fund,
        final_index_fund,
        wealth_delta_pre_tax: last.net_wealth_pre_tax - final_index_fund,
        wealth_delta_after_tax: last.net_wealth_after_tax - final_index_fund,
        yearly_ledger: ledger,
    }
}
