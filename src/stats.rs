use crate::results::ResultRecord;
use serde::Serialize;

pub fn mean(values: &[f64]) -> f64 {
    let sum = values.iter().sum::<f64>();

    sum / values.len() as f64
}

/// Average, maximum and minimum of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub average: f64,
    pub maximum: f64,
    pub minimum: f64,
}

impl Summary {
    /// `None` for an empty series.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        Some(Self {
            average: mean(values),
            maximum: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            minimum: values.iter().copied().fold(f64::INFINITY, f64::min),
        })
    }
}

/// Aggregate figures over the stored history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStatistics {
    pub tests: usize,
    pub download: Summary,
    pub upload: Summary,
    /// Only over records that measured a latency.
    pub ping: Option<Summary>,
}

impl HistoryStatistics {
    pub fn from_records(records: &[ResultRecord]) -> Option<Self> {
        let downloads: Vec<f64> = records.iter().map(|r| r.download_mbps).collect();
        let uploads: Vec<f64> = records.iter().map(|r| r.upload_mbps).collect();
        let pings: Vec<f64> = records
            .iter()
            .map(|r| r.ping_ms)
            .filter(|ping| *ping > 0.0)
            .collect();

        Some(Self {
            tests: records.len(),
            download: Summary::of(&downloads)?,
            upload: Summary::of(&uploads)?,
            ping: Summary::of(&pings),
        })
    }
}

/// Movement of one measurement between two tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Change {
    pub previous: f64,
    pub latest: f64,
    pub difference: f64,
    /// Relative to `previous`; 0 when there is nothing to compare against.
    pub percent: f64,
}

impl Change {
    pub fn between(previous: f64, latest: f64) -> Self {
        let difference = latest - previous;
        let percent = if previous > 0.0 {
            difference / previous * 100.0
        } else {
            0.0
        };

        Self { previous, latest, difference, percent }
    }

    pub fn improved(&self) -> bool {
        self.difference > 0.0
    }
}

/// The latest test against the one before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub previous_timestamp: String,
    pub latest_timestamp: String,
    pub download: Change,
    pub upload: Change,
    /// Latency change in ms; negative is an improvement.
    pub ping_difference: f64,
}

impl Comparison {
    /// Compare the two newest records (given oldest first). Needs at least
    /// two records.
    pub fn latest(records: &[ResultRecord]) -> Option<Self> {
        let [.., previous, latest] = records else {
            return None;
        };

        Some(Self {
            previous_timestamp: previous.timestamp.clone(),
            latest_timestamp: latest.timestamp.clone(),
            download: Change::between(previous.download_mbps, latest.download_mbps),
            upload: Change::between(previous.upload_mbps, latest.upload_mbps),
            ping_difference: latest.ping_ms - previous.ping_ms,
        })
    }
}
