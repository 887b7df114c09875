//! Chart series of averaged basket prices

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One averaged price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Mean basket price, rounded to 2 decimals
    pub average_price: f64,
    pub observed_at: DateTime<Utc>,
}

impl ChartPoint {
    pub fn new(average_price: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            average_price,
            observed_at,
        }
    }

    /// X-axis label (wall clock time of the observation)
    pub fn label(&self) -> String {
        self.observed_at.format("%H:%M:%S").to_string()
    }
}

/// Append-only series of chart points for one monitoring session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    /// Basket the series was recorded for
    pub basket: String,
    points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn new(basket: impl Into<String>) -> Self {
        Self {
            basket: basket.into(),
            points: Vec::new(),
        }
    }

    pub fn push(&mut self, point: ChartPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<&ChartPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Write the series as pretty JSON
    pub fn save_json(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize series")?;
        std::fs::write(path, json).context(format!("Failed to write series to {}", path))?;

        log::info!("Wrote {} chart points to {}", self.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_label_is_time_of_day() {
        let at = Utc.with_ymd_and_hms(2022, 1, 15, 9, 5, 30).unwrap();
        let point = ChartPoint::new(15.0, at);
        assert_eq!(point.label(), "09:05:30");
    }

    #[test]
    fn test_series_appends_in_order() {
        let mut series = ChartSeries::new("majors");
        let at = Utc.with_ymd_and_hms(2022, 1, 15, 9, 0, 0).unwrap();

        series.push(ChartPoint::new(1.0, at));
        series.push(ChartPoint::new(2.0, at));

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].average_price, 1.0);
        assert_eq!(series.last().unwrap().average_price, 2.0);
    }

    #[test]
    fn test_save_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.json");
        let path = path.to_str().unwrap();

        let mut series = ChartSeries::new("majors");
        series.push(ChartPoint::new(42.5, Utc::now()));
        series.save_json(path).unwrap();

        let loaded: ChartSeries =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.basket, "majors");
        assert_eq!(loaded.points()[0].average_price, 42.5);
    }
}
