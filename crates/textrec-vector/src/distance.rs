//! Distance functions. Lower is always closer.

use textrec_core::types::Metric;

pub fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

pub fn norm(a: &[f32]) -> f32 { dot(a, a).sqrt() }

/// Distance between `a` and `b` under `metric`.
///
/// Angular distance is `sqrt(2 - 2 * cos)`; a zero vector has cosine 0 with
/// everything, so it sits at `sqrt(2)` from every other vector.
pub fn distance(metric: Metric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        Metric::Angular => {
            let denom = norm(a) * norm(b);
            let cos = if denom > 0.0 { (dot(a, b) / denom).clamp(-1.0, 1.0) } else { 0.0 };
            (2.0 - 2.0 * cos).max(0.0).sqrt()
        }
        Metric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
        Metric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        Metric::Dot => -dot(a, b),
    }
}

/// `a / |a|`, or `a` unchanged when it is the zero vector.
pub fn normalized(a: &[f32]) -> Vec<f32> {
    let n = norm(a);
    if n > 0.0 { a.iter().map(|x| x / n).collect() } else { a.to_vec() }
}
