//! Composite deal score: a weighted sum of independently-capped metric
//! contributions, clamped into [0, 100].

#[derive(Debug, Clone, Copy)]
pub struct ScoreMetrics {
    pub cash_on_cash: f64,
    pub cap_rate: f64,
    pub dscr: f64,
    pub npv: f64,
    pub cash_flow_year_1: f64,
}

pub fn composite_score(metrics: ScoreMetrics) -> f64 {
    let coc_points = (metrics.cash_on_cash * 100.0 * 1.2).min(40.0);
    let cap_points = (metrics.cap_rate * 100.0 * 0.8).min(25.0);
    let dscr_points = ((metrics.dscr - 1.0) * 25.0).max(0.0).min(15.0);
    let npv_points = (metrics.npv / 20_000.0).max(0.0).min(15.0);
    let cash_points = (metrics.cash_flow_year_1 / 1_000.0).max(0.0).min(5.0);

    (coc_points + cap_points + dscr_points + npv_points + cash_points).clamp(0.0, 100.0)
}
