use crate::recognition::domain::gallery::Gallery;
use crate::shared::embedding::Embedding;

/// A probe accepted as a known identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Match {
    pub name: String,
    pub distance: f64,
}

/// Nearest-neighbor-with-threshold decision rule.
///
/// The gallery identity at minimum Euclidean distance from the probe wins,
/// but only when that minimum is within `dist_threshold`; otherwise the
/// probe is unknown. No calibration or learning beyond the fixed threshold.
pub struct Matcher {
    dist_threshold: f64,
}

impl Matcher {
    pub fn new(dist_threshold: f64) -> Self {
        assert!(
            dist_threshold.is_finite() && dist_threshold >= 0.0,
            "distance threshold must be finite and non-negative, got {dist_threshold}"
        );
        Self { dist_threshold }
    }

    /// Matches one probe against the full gallery.
    ///
    /// Equidistant minima resolve to the first entry in gallery order
    /// (strict `<` scan), which is deterministic for a fixed gallery. An
    /// empty gallery yields no match, which is a normal outcome, not an
    /// error. Probes are matched independently; nothing reserves a gallery
    /// identity across calls.
    pub fn best_match(&self, probe: &Embedding, gallery: &Gallery) -> Option<Match> {
        let mut best: Option<(&str, f64)> = None;
        for entry in gallery.iter() {
            let distance = probe.distance(&entry.embedding);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((&entry.name, distance));
            }
        }

        best.filter(|(_, distance)| *distance <= self.dist_threshold)
            .map(|(name, distance)| Match {
                name: name.to_string(),
                distance,
            })
    }
}
