use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::util::{mean, std_dev};

/// Outcome of one stimulus presentation.
///
/// Field names are the wire format downstream consumers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub stimulus: u8,
    pub response: bool,
    pub correct_response: bool,
    pub correct: bool,
    /// Milliseconds from stimulus onset, `None` when nothing was pressed
    pub rt: Option<f64>,
    pub trial_index: usize,
    pub practice: bool,
}

/// Receives the growing record list after every trial and on early exit.
pub trait ResultSink {
    fn update(&mut self, records: &[TrialRecord], config: &Config) -> Result<()>;
}

#[derive(Serialize)]
struct ResultDocument<'a> {
    participant: &'a str,
    settings: &'a Config,
    #[serde(rename = "rawData")]
    raw_data: RawData<'a>,
}

#[derive(Serialize)]
struct RawData<'a> {
    trials: &'a [TrialRecord],
}

#[derive(Deserialize)]
struct StoredDocument {
    #[serde(rename = "rawData")]
    raw_data: StoredRawData,
}

#[derive(Deserialize)]
struct StoredRawData {
    trials: Vec<TrialRecord>,
}

/// Rewrites a JSON results file on every update.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    participant: String,
}

impl JsonFileSink {
    pub fn new<P: AsRef<Path>>(path: P, participant: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            participant: participant.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonFileSink {
    fn update(&mut self, records: &[TrialRecord], config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let doc = ResultDocument {
            participant: &self.participant,
            settings: config,
            raw_data: RawData { trials: records },
        };
        let data = serde_json::to_vec_pretty(&doc)?;

        // readers never see a half written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), trials = records.len(), "results flushed");
        Ok(())
    }
}

/// Keeps every snapshot it was handed.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub snapshots: Vec<Vec<TrialRecord>>,
}

impl MemorySink {
    pub fn latest(&self) -> &[TrialRecord] {
        self.snapshots.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl ResultSink for MemorySink {
    fn update(&mut self, records: &[TrialRecord], _config: &Config) -> Result<()> {
        self.snapshots.push(records.to_vec());
        Ok(())
    }
}

/// Read the trial records back out of a results file.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<TrialRecord>> {
    let bytes = fs::read(path)?;
    let doc: StoredDocument = serde_json::from_slice(&bytes)?;
    Ok(doc.raw_data.trials)
}

pub fn export_csv<P: AsRef<Path>>(records: &[TrialRecord], path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Main-task summary of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub participant: String,
    pub n_level: usize,
    pub total_trials: usize,
    pub correct_count: usize,
    pub accuracy: f64,
    pub hits: usize,
    pub targets: usize,
    pub false_positives: usize,
    pub mean_rt_ms: Option<f64>,
    pub rt_std_dev_ms: Option<f64>,
    pub completed: bool,
}

impl SessionSummary {
    pub fn from_records(
        participant: &str,
        n_level: usize,
        records: &[TrialRecord],
        completed: bool,
    ) -> Self {
        let main = records.iter().filter(|r| !r.practice).collect_vec();
        let total_trials = main.len();
        let correct_count = main.iter().filter(|r| r.correct).count();
        let targets = main.iter().filter(|r| r.correct_response).count();
        let hits = main.iter().filter(|r| r.correct_response && r.response).count();
        let false_positives = main.iter().filter(|r| !r.correct_response && r.response).count();
        let rts = main.iter().filter_map(|r| r.rt).collect_vec();

        let accuracy = if total_trials == 0 {
            0.0
        } else {
            correct_count as f64 / total_trials as f64 * 100.0
        };

        Self {
            participant: participant.to_string(),
            n_level,
            total_trials,
            correct_count,
            accuracy,
            hits,
            targets,
            false_positives,
            mean_rt_ms: mean(&rts),
            rt_std_dev_ms: std_dev(&rts),
            completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(i: usize, response: bool, correct_response: bool, practice: bool) -> TrialRecord {
        TrialRecord {
            stimulus: (i % 10) as u8,
            response,
            correct_response,
            correct: response == correct_response,
            rt: response.then_some(400.0 + i as f64),
            trial_index: i,
            practice,
        }
    }

    #[test]
    fn record_wire_shape() {
        let value = serde_json::to_value(record(3, false, true, false)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "stimulus": 3,
                "response": false,
                "correct_response": true,
                "correct": false,
                "rt": null,
                "trial_index": 3,
                "practice": false
            })
        );
    }

    #[test]
    fn json_sink_overwrites_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("results.json");
        let mut sink = JsonFileSink::new(&path, "p1");
        let cfg = Config::default();

        let records = vec![record(0, true, false, true), record(1, false, false, true)];
        sink.update(&records[..1], &cfg).unwrap();
        sink.update(&records, &cfg).unwrap();

        assert_eq!(load_records(&path).unwrap(), records);
        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["participant"], "p1");
        assert_eq!(raw["settings"]["nBackSettings"]["nLevel"], 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trials.csv");
        export_csv(&[record(0, true, true, false), record(1, false, false, false)], &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("stimulus,response,correct_response,correct,rt,trial_index,practice")
        );
        assert_eq!(lines.next(), Some("0,true,true,true,400.0,0,false"));
        assert_eq!(lines.next(), Some("1,false,false,true,,1,false"));
    }

    #[test]
    fn summary_counts_main_trials_only() {
        let records = vec![
            record(0, true, true, true),
            record(0, false, false, false),
            record(1, true, true, false),
            record(2, true, false, false),
            record(3, false, true, false),
        ];
        let s = SessionSummary::from_records("p", 2, &records, true);
        assert_eq!(s.total_trials, 4);
        assert_eq!(s.correct_count, 2);
        assert_eq!(s.accuracy, 50.0);
        assert_eq!(s.targets, 2);
        assert_eq!(s.hits, 1);
        assert_eq!(s.false_positives, 1);
        assert_eq!(s.mean_rt_ms, Some(401.5));
    }

    #[test]
    fn empty_summary_is_neutral() {
        let s = SessionSummary::from_records("p", 2, &[], false);
        assert_eq!(s.accuracy, 0.0);
        assert_eq!(s.mean_rt_ms, None);
        assert!(!s.completed);
    }
}
