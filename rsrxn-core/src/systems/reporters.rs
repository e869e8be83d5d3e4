//! Reporters record parts of the state vector while a system runs.

use crate::errors::{RxnError, RxnResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a reporter extracts from the state vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "idxs")]
pub enum ReporterKind {
    /// The whole state vector
    All,
    /// The quantities at the given indices
    Selection(Vec<usize>),
    Sum(Vec<usize>),
    Avg(Vec<usize>),
    /// `(max, position of the max within the selection)`
    Max(Vec<usize>),
    /// `(min, position of the min within the selection)`
    Min(Vec<usize>),
}

impl ReporterKind {
    fn idxs(&self) -> Option<&[usize]> {
        match self {
            Self::All => None,
            Self::Selection(idxs)
            | Self::Sum(idxs)
            | Self::Avg(idxs)
            | Self::Max(idxs)
            | Self::Min(idxs) => Some(idxs),
        }
    }

    fn columns(&self, n: usize) -> Vec<String> {
        match self {
            Self::All => (0..n).map(|i| format!("q_{i}")).collect(),
            Self::Selection(idxs) => idxs.iter().map(|i| format!("q_{i}")).collect(),
            Self::Sum(_) => vec!["sum".to_string()],
            Self::Avg(_) => vec!["avg".to_string()],
            Self::Max(_) => vec!["max".to_string(), "argmax".to_string()],
            Self::Min(_) => vec!["min".to_string(), "argmin".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub t: f64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reporter {
    /// Reporting interval in seconds
    pub freq: f64,
    pub kind: ReporterKind,
    #[serde(skip)]
    reports: Vec<Report>,
}

impl Reporter {
    pub fn new(kind: ReporterKind, freq: f64) -> RxnResult<Self> {
        if freq <= 0.0 || !freq.is_finite() {
            return Err(RxnError::Error(format!(
                "reporter frequency must be positive, got {freq}"
            )));
        }
        if kind.idxs().is_some_and(<[usize]>::is_empty) {
            return Err(RxnError::Error(
                "reporter selection must not be empty".to_string(),
            ));
        }
        Ok(Self {
            freq,
            kind,
            reports: Vec::new(),
        })
    }

    pub fn all(freq: f64) -> RxnResult<Self> {
        Self::new(ReporterKind::All, freq)
    }

    /// Checks that every selected index exists in a state of length `n`.
    pub fn validate(&self, n: usize) -> RxnResult<()> {
        match self.kind.idxs().and_then(|idxs| idxs.iter().find(|&&i| i >= n)) {
            Some(&idx) => Err(RxnError::UnknownIndex(idx)),
            None => Ok(()),
        }
    }

    pub fn report(&mut self, t: f64, q: &[f64]) -> RxnResult<()> {
        let pick = |idxs: &[usize]| -> RxnResult<Vec<f64>> {
            idxs.iter()
                .map(|&i| q.get(i).copied().ok_or(RxnError::UnknownIndex(i)))
                .collect()
        };
        let values = match &self.kind {
            ReporterKind::All => q.to_vec(),
            ReporterKind::Selection(idxs) => pick(idxs)?,
            ReporterKind::Sum(idxs) => vec![pick(idxs)?.iter().sum()],
            ReporterKind::Avg(idxs) => {
                let values = pick(idxs)?;
                vec![values.iter().sum::<f64>() / values.len() as f64]
            }
            ReporterKind::Max(idxs) => {
                let (pos, value) = extreme(&pick(idxs)?, |a, b| a > b);
                vec![value, pos as f64]
            }
            ReporterKind::Min(idxs) => {
                let (pos, value) = extreme(&pick(idxs)?, |a, b| a < b);
                vec![value, pos as f64]
            }
        };
        self.reports.push(Report { t, values });
        Ok(())
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }

    /// Writes one row per report, `t` first.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> RxnResult<()> {
        let n = self.reports.first().map_or(0, |r| r.values.len());
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["t".to_string()];
        header.extend(self.kind.columns(n));
        writer.write_record(&header)?;
        for report in &self.reports {
            let mut record = vec![report.t.to_string()];
            record.extend(report.values.iter().map(f64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// First position holding the extreme value under `better`.
fn extreme(values: &[f64], better: impl Fn(f64, f64) -> bool) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, values[0]), |best, (i, v)| {
            if better(v, best.1) {
                (i, v)
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q: [f64; 4] = [3.0, 1.0, 4.0, 1.5];

    fn reported(kind: ReporterKind) -> Vec<f64> {
        let mut reporter = Reporter::new(kind, 1.0).unwrap();
        reporter.report(2.0, &Q).unwrap();
        assert_eq!(reporter.reports()[0].t, 2.0);
        reporter.reports()[0].values.clone()
    }

    #[test]
    fn reporter_kinds() {
        assert_eq!(reported(ReporterKind::All), Q.to_vec());
        assert_eq!(reported(ReporterKind::Selection(vec![2, 0])), vec![4.0, 3.0]);
        assert_eq!(reported(ReporterKind::Sum(vec![0, 1])), vec![4.0]);
        assert_eq!(reported(ReporterKind::Avg(vec![1, 3])), vec![1.25]);
        assert_eq!(reported(ReporterKind::Max(vec![1, 2, 3])), vec![4.0, 1.0]);
        assert_eq!(reported(ReporterKind::Min(vec![0, 3, 1])), vec![1.0, 2.0]);
    }

    #[test]
    fn invalid_reporters() {
        assert!(Reporter::new(ReporterKind::All, 0.0).is_err());
        assert!(Reporter::new(ReporterKind::Sum(vec![]), 1.0).is_err());

        let mut reporter = Reporter::new(ReporterKind::Selection(vec![7]), 1.0).unwrap();
        assert!(matches!(reporter.validate(4), Err(RxnError::UnknownIndex(7))));
        assert!(reporter.report(0.0, &Q).is_err());
        assert!(reporter.reports().is_empty());
    }

    #[test]
    fn csv_output() {
        let mut reporter = Reporter::new(ReporterKind::Max(vec![0, 2]), 0.5).unwrap();
        reporter.report(0.0, &Q).unwrap();
        reporter.report(0.5, &[5.0, 0.0, 1.0, 0.0]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("max.csv");
        reporter.to_csv(&path).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "t,max,argmax\n0,4,1\n0.5,5,0\n");
    }

    #[test]
    fn kinds_from_toml() {
        let kind: ReporterKind = toml::from_str::<Reporter>("freq = 2.0\nkind = { kind = \"Sum\", idxs = [1, 2] }")
            .map(|r| r.kind)
            .unwrap();
        assert_eq!(kind, ReporterKind::Sum(vec![1, 2]));
    }
}
