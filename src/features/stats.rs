//! Small descriptive statistics used by the extractors and fusion

/// Arithmetic mean, None for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (n denominator)
pub fn population_std(values: &[f64]) -> f64 {
    match mean(values) {
        Some(m) => {
            let variance =
                values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
            variance.sqrt()
        }
        None => 0.0,
    }
}

/// Sample standard deviation (n - 1 denominator), 0 for fewer than 2 values
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() <= 1 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Pearson correlation coefficient
///
/// None when the slices differ in length, hold fewer than 2 points, or either
/// series has zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}

/// Round to 3 decimals
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
