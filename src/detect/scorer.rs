use serde::Serialize;
use tracing::{debug, info};

use crate::detect::forest::{validate_rows, FeatureRow, ForestParams, IsolationForest};
use crate::detect::DetectError;
use crate::reading::Reading;

/// Score assigned when a single reading is scored: nothing to compare it to.
const NEUTRAL_SCORE: f64 = 0.5;

/// What a scoring pass did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreReport {
    pub readings: usize,
    pub flagged: usize,
    /// Score of the least anomalous flagged reading, if any were flagged.
    pub threshold: Option<f64>,
    pub trees: usize,
    pub subsample: usize,
}

/// Fit an isolation forest over every reading and flag the
/// `floor(contamination * N)` most anomalous ones.
///
/// Ties on the score are broken by buffer position (earlier first), so
/// identical input always yields identical flags. Readings are only touched
/// once the whole pass has succeeded.
pub fn score_anomalies(
    readings: &mut [Reading],
    params: &ForestParams,
) -> Result<ScoreReport, DetectError> {
    params.validate()?;
    let data: Vec<FeatureRow> = readings.iter().map(Reading::features).collect();
    validate_rows(&data)?;

    if data.len() == 1 {
        readings[0].anomaly = Some(false);
        readings[0].anomaly_score = Some(NEUTRAL_SCORE);
        return Ok(ScoreReport {
            readings: 1,
            flagged: 0,
            threshold: None,
            trees: 0,
            subsample: 1,
        });
    }

    let forest = IsolationForest::fit(&data, params)?;
    let scores = forest.score_all(&data);

    let k = flag_count(data.len(), params.contamination);
    let mut ranked: Vec<usize> = (0..scores.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

    let mut flags = vec![false; scores.len()];
    for &i in &ranked[..k] {
        flags[i] = true;
    }
    let threshold = ranked[..k].last().map(|&i| scores[i]);

    for ((reading, flag), score) in readings.iter_mut().zip(flags).zip(&scores) {
        reading.anomaly = Some(flag);
        reading.anomaly_score = Some(*score);
    }

    debug!(?threshold, "anomaly threshold");
    info!(
        readings = data.len(),
        flagged = k,
        contamination = params.contamination,
        "anomaly scoring complete"
    );

    Ok(ScoreReport {
        readings: data.len(),
        flagged: k,
        threshold,
        trees: forest.n_trees(),
        subsample: forest.subsample(),
    })
}

/// Number of readings to flag for a given contamination fraction.
pub fn flag_count(n: usize, contamination: f64) -> usize {
    ((contamination * n as f64).floor() as usize).min(n)
}
