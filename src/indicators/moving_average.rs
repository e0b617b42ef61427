/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Smoothing factor for a half-life measured in bars
pub fn halflife_alpha(halflife: f64) -> f64 {
    1.0 - (-std::f64::consts::LN_2 / halflife).exp()
}

/// Calculate the exponentially weighted mean of `prices` for a given half-life
///
/// Uses the normalised form: the weight of the price `i` bars back is
/// `(1 - alpha)^i`, divided by the sum of all weights. Well-defined from the
/// first price onwards.
pub fn calculate_ewma_halflife(prices: &[f64], halflife: f64) -> Option<f64> {
    if prices.is_empty() || !halflife.is_finite() || halflife <= 0.0 {
        return None;
    }

    let decay = 1.0 - halflife_alpha(halflife);

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for price in prices {
        weighted_sum = weighted_sum * decay + price;
        weight_total = weight_total * decay + 1.0;
    }

    Some(weighted_sum / weight_total)
}
