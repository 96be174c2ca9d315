//! Plain-language summary of a numeric forecast.
//!
//! [`summarize`] is a pure function of the prediction mapping.

use serde::{Deserialize, Serialize};

use crate::models::{Predictions, Variable};

// ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionText {
    pub summary: Vec<String>,
    pub trend: Vec<String>,
}

/// Minimum change over the horizon reported as a trend, per variable.
fn trend_threshold(var: Variable) -> f64 {
    match var {
        Variable::Temperature => 1.0,
        Variable::Humidity => 5.0,
        Variable::WindSpeed => 1.0,
        Variable::Radiation => 100.0,
        Variable::Precipitation => 0.5,
    }
}

fn label(var: Variable) -> &'static str {
    match var {
        Variable::Temperature => "Temperature",
        Variable::Humidity => "Humidity",
        Variable::WindSpeed => "Wind speed",
        Variable::Radiation => "Solar radiation",
        Variable::Precipitation => "Precipitation",
    }
}

fn unit(var: Variable) -> &'static str {
    match var {
        Variable::Temperature => "°C",
        Variable::Humidity => "%",
        Variable::WindSpeed => " m/s",
        Variable::Radiation => " W/m²",
        Variable::Precipitation => " mm",
    }
}

fn summary_line(var: Variable, values: &[f64]) -> String {
    // ---
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let u = unit(var);

    match var {
        Variable::Precipitation => {
            let total: f64 = values.iter().sum();
            if total > 0.0 {
                format!("Rain expected, about {:.1}{} in total", total, u)
            } else {
                "No rain expected".to_string()
            }
        }
        Variable::WindSpeed => format!("Winds up to {:.1}{}", max, u),
        Variable::Radiation => format!("Solar radiation peaking at {:.0}{}", max, u),
        _ => format!("{} between {:.1}{} and {:.1}{}", label(var), min, u, max, u),
    }
}

fn trend_line(var: Variable, values: &[f64]) -> String {
    // ---
    if var == Variable::Precipitation {
        return match values.iter().position(|v| *v > 0.0) {
            Some(hour) => format!("Rain likely from hour {}", hour + 1),
            None => "Dry conditions throughout".to_string(),
        };
    }

    let (first, last) = match (values.first(), values.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return format!("{} unknown", label(var)),
    };
    let delta = last - first;
    let u = unit(var);

    if delta >= trend_threshold(var) {
        format!("{} rising by {:.1}{}", label(var), delta, u)
    } else if delta <= -trend_threshold(var) {
        format!("{} falling by {:.1}{}", label(var), -delta, u)
    } else {
        format!("{} steady", label(var))
    }
}

/// Describe each variable present in `predictions`.
pub fn summarize(predictions: &Predictions) -> PredictionText {
    // ---
    let mut text = PredictionText::default();

    for var in Variable::ALL {
        let Some(values) = predictions.get(var.name()).filter(|v| !v.is_empty()) else {
            continue;
        };
        text.summary.push(summary_line(var, values));
        text.trend.push(trend_line(var, values));
    }

    if text.summary.is_empty() {
        text.summary.push("No forecast available".to_string());
    }
    text
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn predictions(entries: &[(&str, Vec<f64>)]) -> Predictions {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_rising_temperature() {
        // ---
        let p = predictions(&[("temperature", (0..8).map(|i| 25.0 + i as f64 * 0.5).collect())]);
        let text = summarize(&p);

        assert_eq!(text.summary, vec!["Temperature between 25.0°C and 28.5°C"]);
        assert_eq!(text.trend, vec!["Temperature rising by 3.5°C"]);
    }

    #[test]
    fn test_precipitation_onset() {
        // ---
        let p = predictions(&[(
            "precipitation",
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.1],
        )]);
        let text = summarize(&p);

        assert_eq!(text.summary, vec!["Rain expected, about 0.3 mm in total"]);
        assert_eq!(text.trend, vec!["Rain likely from hour 6"]);
    }

    #[test]
    fn test_steady_humidity_and_order() {
        // ---
        let p = predictions(&[
            ("humidity", vec![60.0, 61.0, 62.0, 61.0, 60.0, 61.0, 62.0, 63.0]),
            ("wind_speed", vec![3.0; 8]),
        ]);
        let text = summarize(&p);

        assert_eq!(text.summary.len(), 2);
        assert!(text.summary[0].starts_with("Humidity"));
        assert_eq!(text.trend, vec!["Humidity steady", "Wind speed steady"]);
    }

    #[test]
    fn test_empty_predictions() {
        // ---
        let text = summarize(&Predictions::new());
        assert_eq!(text.summary, vec!["No forecast available"]);
        assert!(text.trend.is_empty());
    }
}
