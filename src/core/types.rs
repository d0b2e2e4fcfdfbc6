use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BuyerType {
    Individual,
    Company,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoanType {
    Repayment,
    InterestOnly,
}

/// One full set of deal assumptions. Immutable per computation; the engine
/// never mutates it and derives a fresh `DealSummary` on every call.
#[derive(Debug, Clone)]
pub struct DealInputs {
    pub purchase_price: f64,
    pub deposit_pct: f64,
    pub closing_costs_pct: f64,
    pub renovation_cost: f64,
    pub buyer_type: BuyerType,
    pub properties_owned: u32,
    pub first_time_buyer: bool,

    pub interest_rate: f64,
    pub mortgage_years: u32,
    pub loan_type: LoanType,

    pub monthly_rent: f64,
    pub vacancy_pct: f64,
    pub mgmt_pct: f64,
    pub repairs_pct: f64,
    pub insurance_per_year: f64,
    pub other_opex_per_year: f64,

    pub annual_appreciation: f64,
    pub rent_growth: f64,
    pub exit_year: u32,
    pub selling_costs_pct: f64,
    pub discount_rate: f64,

    pub income_person_1: f64,
    pub income_person_2: f64,
    pub ownership_share_1: f64,
    pub ownership_share_2: f64,
    pub reinvest_income: bool,
    pub reinvest_pct: f64,
    pub index_fund_growth: f64,
}

impl Default for DealInputs {
    fn default() -> Self {
        Self {
            purchase_price: 250_000.0,
            deposit_pct: 0.25,
            closing_costs_pct: 0.015,
            renovation_cost: 0.0,
            buyer_type: BuyerType::Individual,
            properties_owned: 0,
            first_time_buyer: false,
            interest_rate: 0.055,
            mortgage_years: 30,
            loan_type: LoanType::Repayment,
            monthly_rent: 1_400.0,
            vacancy_pct: 0.05,
            mgmt_pct: 0.10,
            repairs_pct: 0.08,
            insurance_per_year: 500.0,
            other_opex_per_year: 300.0,
            annual_appreciation: 0.03,
            rent_growth: 0.02,
            exit_year: 10,
            selling_costs_pct: 0.02,
            discount_rate: 0.05,
            income_person_1: 40_000.0,
            income_person_2: 0.0,
            ownership_share_1: 1.0,
            ownership_share_2: 0.0,
            reinvest_income: false,
            reinvest_pct: 0.0,
            index_fund_growth: 0.07,
        }
    }
}

/// One row of the projection ledger. Entry 0 is the acquisition baseline
/// (all flow fields zero); entries 1..=exit_year carry the per-year flows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyLedgerEntry {
    pub year: u32,
    pub gross_rent: f64,
    pub operating_expenses: f64,
    pub noi: f64,
    pub debt_service: f64,
    pub interest_paid: f64,
    pub pre_tax_cash_flow: f64,
    pub property_tax: f64,
    pub after_tax_cash_flow: f64,
    pub cumulative_pre_tax_cash: f64,
    /// Net of capital diverted into the reinvestment fund, so wealth sums
    /// never count reinvested cash twice.
    pub cumulative_after_tax_cash: f64,
    pub reinvestment_fund_balance: f64,
    pub property_market_value: f64,
    pub remaining_loan_balance: f64,
    pub index_fund_balance: f64,
    pub gross_wealth_pre_tax: f64,
    pub gross_wealth_after_tax: f64,
    pub net_wealth_pre_tax: f64,
    pub net_wealth_after_tax: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealSummary {
    pub deposit: f64,
    pub stamp_duty: f64,
    pub total_closing_costs: f64,
    pub total_cash_invested: f64,
    pub loan_amount: f64,
    pub monthly_mortgage_payment: f64,

    pub noi_year_1: f64,
    pub cash_flow_year_1: f64,
    pub cap_rate: f64,
    pub cash_on_cash: f64,
    pub dscr_year_1: f64,
    pub yield_on_cost: f64,

    pub remaining_loan_at_exit: f64,
    pub future_property_value: f64,
    pub net_sale_proceeds: f64,
    pub npv: f64,
    pub score: f64,

    pub total_property_tax: f64,
    pub total_reinvested: f64,
    pub final_reinvestment_fund: f64,
    pub final_index_fund: f64,
    pub wealth_delta_pre_tax: f64,
    pub wealth_delta_after_tax: f64,

    pub yearly_ledger: Vec<YearlyLedgerEntry>,
}
