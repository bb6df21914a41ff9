//! Survival association: cluster-label join, multivariate log-rank test, and
//! per-cluster Kaplan-Meier curves

use crate::dataset::Dataset;
use crate::error::{DeckError, Result};
use crate::validate::{EVENT_COLUMN, TIME_COLUMN};
use serde::Serialize;
use std::collections::HashMap;

/// Kaplan-Meier step curve for one cluster, plus censoring markers rendered
/// separately from the step line
#[derive(Debug, Clone, Serialize)]
pub struct SurvivalCurve {
    pub cluster: usize,
    pub n_samples: usize,
    /// Step-function x values, starting at time 0
    pub times: Vec<f64>,
    /// Survival probability after each time in `times`
    pub probabilities: Vec<f64>,
    /// Times at which censoring occurred
    pub censored_times: Vec<f64>,
    /// Step-function value at each censored time
    pub censored_probabilities: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurvivalOutcome {
    /// Log-rank p-value under the null of identical event-time distributions
    pub p_value: f64,
    /// Samples present in both the label table and the clinical dataset
    pub n_joined: usize,
    pub curves: Vec<SurvivalCurve>,
}

/// One joined observation
#[derive(Debug, Clone, Copy)]
struct Subject {
    time: f64,
    event: bool,
    label: usize,
}

/// Join cluster labels to clinical outcomes and test the association.
///
/// `sample_ids` and `labels` are parallel arrays; the join is an inner join
/// on sample identifier against the clinical dataset's rows.
///
/// # Errors
/// Returns `Computation` on mismatched array lengths or unusable clinical
/// columns, `Join` when no sample identifier overlaps
pub fn analyze(
    clinical: &Dataset,
    sample_ids: &[String],
    labels: &[usize],
) -> Result<SurvivalOutcome> {
    if sample_ids.len() != labels.len() {
        return Err(DeckError::Computation(format!(
            "{} sample ids with {} labels",
            sample_ids.len(),
            labels.len()
        )));
    }

    let events = clinical.numeric_column(EVENT_COLUMN)?;
    let times = clinical.numeric_column(TIME_COLUMN)?;

    let mut label_for: HashMap<&str, usize> = HashMap::with_capacity(sample_ids.len());
    for (id, &label) in sample_ids.iter().zip(labels) {
        label_for.entry(id.as_str()).or_insert(label);
    }

    let subjects: Vec<Subject> = clinical
        .sample_ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| {
            label_for.get(id.as_str()).map(|&label| Subject {
                time: times[i],
                event: events[i] == 1.0,
                label,
            })
        })
        .collect();

    if subjects.is_empty() {
        return Err(DeckError::Join(
            "no sample identifiers shared between cluster labels and clinical data".into(),
        ));
    }

    let mut clusters: Vec<usize> = subjects.iter().map(|s| s.label).collect();
    clusters.sort_unstable();
    clusters.dedup();

    let p_value = log_rank_p_value(&subjects, &clusters);

    let curves = clusters
        .iter()
        .map(|&cluster| {
            let group: Vec<&Subject> = subjects.iter().filter(|s| s.label == cluster).collect();
            kaplan_meier(cluster, &group)
        })
        .collect();

    Ok(SurvivalOutcome {
        p_value,
        n_joined: subjects.len(),
        curves,
    })
}

/// Multivariate log-rank statistic across all clusters jointly: observed vs
/// expected events accumulated at every distinct event time, chi-square with
/// k-1 degrees of freedom.
#[allow(clippy::cast_precision_loss)]
fn log_rank_p_value(subjects: &[Subject], clusters: &[usize]) -> f64 {
    let k = clusters.len();
    if k < 2 {
        // One group: nothing to compare
        return 1.0;
    }

    let mut event_times: Vec<f64> = subjects
        .iter()
        .filter(|s| s.event)
        .map(|s| s.time)
        .collect();
    event_times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    event_times.dedup();

    let group_of = |label: usize| {
        clusters
            .iter()
            .position(|&c| c == label)
            .unwrap_or_default()
    };

    let mut observed = vec![0.0; k];
    let mut expected = vec![0.0; k];

    for &t in &event_times {
        let at_risk: Vec<&Subject> = subjects.iter().filter(|s| s.time >= t).collect();
        let n_total = at_risk.len() as f64;
        if n_total == 0.0 {
            continue;
        }
        let d_total = at_risk
            .iter()
            .filter(|s| s.event && s.time == t)
            .count() as f64;

        for (g, &cluster) in clusters.iter().enumerate() {
            let n_g = at_risk.iter().filter(|s| s.label == cluster).count() as f64;
            expected[g] += d_total * n_g / n_total;
        }
        for s in &at_risk {
            if s.event && s.time == t {
                observed[group_of(s.label)] += 1.0;
            }
        }
    }

    let statistic: f64 = observed
        .iter()
        .zip(&expected)
        .filter(|(_, e)| **e > 0.0)
        .map(|(o, e)| (o - e).powi(2) / e)
        .sum();

    chi_square_sf(statistic, (k - 1) as f64).clamp(0.0, 1.0)
}

/// Kaplan-Meier estimator for one cluster's joined subjects
#[allow(clippy::cast_precision_loss)]
fn kaplan_meier(cluster: usize, group: &[&Subject]) -> SurvivalCurve {
    let mut ordered: Vec<&Subject> = group.to_vec();
    ordered.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal));

    let mut times = vec![0.0];
    let mut probabilities = vec![1.0];
    let mut censored_times = Vec::new();
    let mut censored_probabilities = Vec::new();

    let mut at_risk = ordered.len() as f64;
    let mut survival = 1.0;

    let mut i = 0;
    while i < ordered.len() {
        let t = ordered[i].time;
        let mut deaths = 0.0;
        let mut censored = 0usize;
        while i < ordered.len() && ordered[i].time == t {
            if ordered[i].event {
                deaths += 1.0;
            } else {
                censored += 1;
            }
            i += 1;
        }

        // Events at t are processed before censorings at t, so a censored
        // marker sits on the step the events produced
        if deaths > 0.0 && at_risk > 0.0 {
            survival *= 1.0 - deaths / at_risk;
            times.push(t);
            probabilities.push(survival);
        }
        for _ in 0..censored {
            censored_times.push(t);
            censored_probabilities.push(survival);
        }

        at_risk -= deaths + censored as f64;
    }

    SurvivalCurve {
        cluster,
        n_samples: group.len(),
        times,
        probabilities,
        censored_times,
        censored_probabilities,
    }
}

/// Upper tail of the chi-square distribution: `Q(df/2, x/2)`.
///
/// Regularized incomplete gamma via the series form for small arguments and
/// the Lentz continued fraction otherwise (Numerical Recipes gammp/gammq).
fn chi_square_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 || df <= 0.0 {
        return 1.0;
    }
    let a = df / 2.0;
    let x = x / 2.0;
    if x < a + 1.0 {
        1.0 - lower_gamma_series(a, x)
    } else {
        upper_gamma_cf(a, x)
    }
}

/// Regularized lower incomplete gamma P(a, x) by series expansion
fn lower_gamma_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut term = sum;
    for _ in 0..200 {
        ap += 1.0;
        term *= x / ap;
        sum += term;
        if term.abs() < sum.abs() * 1e-14 {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Regularized upper incomplete gamma Q(a, x) by Lentz continued fraction
fn upper_gamma_cf(a: f64, x: f64) -> f64 {
    let tiny = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / tiny;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..200 {
        let an = -f64::from(i) * (f64::from(i) - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < tiny {
            d = tiny;
        }
        c = b + an / c;
        if c.abs() < tiny {
            c = tiny;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < 1e-14 {
            break;
        }
    }
    h * (-x + a * x.ln() - ln_gamma(a)).exp()
}

/// Lanczos approximation of ln Γ(x) for x > 0
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let tmp = x + 5.5;
    let tmp = (x + 0.5).mul_add(tmp.ln(), -tmp);
    let mut ser = 1.000_000_000_190_015;
    for (j, c) in COEFFS.iter().enumerate() {
        ser += c / (x + 1.0 + j as f64);
    }
    tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}
