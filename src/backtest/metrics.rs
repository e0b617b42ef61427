use serde::{Deserialize, Serialize};

/// Performance statistics of a strategy's per-bar log returns
///
/// Ratios that would divide by zero are `None` and print as `undefined`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyStatistics {
    pub periods: usize,
    pub periods_per_year: f64,

    /// `exp(Σr) - 1`
    pub total_return: f64,
    /// `mean(r) · P`
    pub annualized_return: Option<f64>,
    /// `std(r, ddof = 1) · √P`
    pub annualized_volatility: Option<f64>,
    pub sharpe_ratio: Option<f64>,

    /// Largest peak-to-trough fall of the cumulative equity curve, as a fraction
    pub max_drawdown: f64,

    pub num_trades: usize,
}

impl StrategyStatistics {
    /// Compute statistics from strategy log returns
    ///
    /// # Arguments
    /// * `returns` - Per-bar log returns of the strategy (exposure already shifted)
    /// * `periods_per_year` - Annualisation factor (252 for daily bars)
    /// * `num_trades` - Orders issued during the run
    pub fn from_log_returns(returns: &[f64], periods_per_year: f64, num_trades: usize) -> Self {
        let n = returns.len();
        let total_log: f64 = returns.iter().sum();

        let mean = if n > 0 {
            Some(total_log / n as f64)
        } else {
            None
        };

        let std_dev = mean.filter(|_| n >= 2).map(|mean| {
            let variance = returns
                .iter()
                .map(|r| {
                    let diff = r - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (n - 1) as f64;
            variance.sqrt()
        });

        let annualized_return = mean.map(|m| m * periods_per_year);
        let annualized_volatility = std_dev.map(|s| s * periods_per_year.sqrt());

        let sharpe_ratio = match (annualized_return, annualized_volatility) {
            (Some(ret), Some(vol)) if vol > 0.0 => Some(ret / vol),
            _ => None,
        };

        Self {
            periods: n,
            periods_per_year,
            total_return: total_log.exp() - 1.0,
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown: Self::calculate_drawdown(returns),
            num_trades,
        }
    }

    fn calculate_drawdown(returns: &[f64]) -> f64 {
        let mut cumulative = 0.0;
        let mut peak = 0.0_f64;
        let mut max_dd = 0.0_f64;

        for r in returns {
            cumulative += r;
            peak = peak.max(cumulative);

            // Fractional fall of equity from its peak
            let drawdown = 1.0 - (cumulative - peak).exp();
            max_dd = max_dd.max(drawdown);
        }

        max_dd
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self, title: &str) {
        println!("\n=== {} ===", title);
        println!("  Periods:               {}", self.periods);
        println!("  Trades:                {}", self.num_trades);
        println!("  Total Return:          {:+.4}%", self.total_return * 100.0);
        println!(
            "  Annualized Return:     {}",
            format_ratio(self.annualized_return.map(|r| r * 100.0), "%")
        );
        println!(
            "  Annualized Volatility: {}",
            format_ratio(self.annualized_volatility.map(|v| v * 100.0), "%")
        );
        println!("  Sharpe Ratio:          {}", format_ratio(self.sharpe_ratio, ""));
        println!("  Max Drawdown:          {:.4}%", self.max_drawdown * 100.0);
    }
}

/// Render an optional ratio, or `undefined`
pub fn format_ratio(value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.4}{}", v, suffix),
        None => "undefined".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_return_compounds_log_returns() {
        let returns = vec![0.01, -0.005, 0.02];
        let stats = StrategyStatistics::from_log_returns(&returns, 252.0, 3);

        let expected = (0.025_f64).exp() - 1.0;
        assert!((stats.total_return - expected).abs() < 1e-12);
        assert_eq!(stats.num_trades, 3);
    }

    #[test]
    fn test_annualisation_uses_sample_std() {
        let returns = vec![0.01, 0.03];
        let stats = StrategyStatistics::from_log_returns(&returns, 252.0, 0);

        // mean 0.02, sample std sqrt(0.0002) = 0.0141421...
        assert!((stats.annualized_return.unwrap() - 0.02 * 252.0).abs() < 1e-9);
        let vol = 0.0002_f64.sqrt() * 252.0_f64.sqrt();
        assert!((stats.annualized_volatility.unwrap() - vol).abs() < 1e-9);
        assert!((stats.sharpe_ratio.unwrap() - (0.02 * 252.0) / vol).abs() < 1e-9);
    }

    #[test]
    fn test_zero_volatility_sharpe_is_undefined() {
        let returns = vec![0.0; 10];
        let stats = StrategyStatistics::from_log_returns(&returns, 252.0, 0);

        assert_eq!(stats.annualized_volatility, Some(0.0));
        assert_eq!(stats.sharpe_ratio, None);
        assert_eq!(stats.total_return, 0.0);
    }

    #[test]
    fn test_too_few_returns_leave_ratios_undefined() {
        let stats = StrategyStatistics::from_log_returns(&[0.01], 252.0, 1);
        assert!(stats.annualized_return.is_some());
        assert_eq!(stats.annualized_volatility, None);
        assert_eq!(stats.sharpe_ratio, None);

        let stats = StrategyStatistics::from_log_returns(&[], 252.0, 0);
        assert_eq!(stats.annualized_return, None);
        assert_eq!(stats.total_return, 0.0);
    }

    #[test]
    fn test_drawdown_calculation() {
        // Up 10%, then down to half of the peak, then partly back
        let returns = vec![0.1_f64.ln_1p(), 0.5_f64.ln(), 0.2_f64.ln_1p()];
        let stats = StrategyStatistics::from_log_returns(&returns, 252.0, 0);

        assert!((stats.max_drawdown - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(None, ""), "undefined");
        assert_eq!(format_ratio(Some(1.5), "%"), "1.5000%");
    }
}
