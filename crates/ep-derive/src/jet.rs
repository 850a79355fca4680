//! Jet truth labelling.
//!
//! Two jet-level classifiers:
//! - [`enhanced_truth_label`] splits light jets by whether a b-jet overlaps
//!   them and by how many hard-scatter truth jets surround the pair.
//! - [`constituent_category`] folds the truth origin of a jet's selected
//!   tracks into a single severity code.

/// Hadron-cone truth label of a light jet.
pub const LABEL_LIGHT: i32 = 0;
/// Hadron-cone truth label of a charm jet.
pub const LABEL_CHARM: i32 = 4;
/// Hadron-cone truth label of a bottom jet.
pub const LABEL_BOTTOM: i32 = 5;

/// Cone within which a b-jet counts as overlapping a light jet.
pub const BJET_OVERLAP_CONE: f64 = 0.1;
/// Cone around the light/b pair midpoint in which truth jets are counted.
pub const TRUTH_JET_CONE: f64 = 1.0;
/// Truth jets below this pt (GeV) are not counted.
pub const TRUTH_JET_MIN_PT: f64 = 20.0;

/// Constituent category: at least one selected track from a b-hadron decay.
pub const CATEGORY_B: i32 = 0;
/// Constituent category: charm tracks, no b tracks.
pub const CATEGORY_C: i32 = 1;
/// Constituent category: tau or other secondary tracks only.
pub const CATEGORY_TAU_OTHER: i32 = 2;
/// Constituent category: no secondary tracks.
pub const CATEGORY_NONE: i32 = 3;

/// Angular distance in the (eta, phi) plane.
///
/// The phi difference is taken as is, without wrapping into `(-pi, pi]`.
#[inline]
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    ((eta1 - eta2).powi(2) + (phi1 - phi2).powi(2)).sqrt()
}

/// Index-aligned kinematic arrays of one jet collection.
#[derive(Debug, Clone, Copy)]
pub struct JetKinematics<'a> {
    /// Transverse momentum (GeV).
    pub pt: &'a [f64],
    /// Pseudorapidity.
    pub eta: &'a [f64],
    /// Azimuth.
    pub phi: &'a [f64],
}

impl<'a> JetKinematics<'a> {
    /// Bundle three aligned arrays.
    pub fn new(pt: &'a [f64], eta: &'a [f64], phi: &'a [f64]) -> Self {
        Self { pt, eta, phi }
    }

    /// Number of jets with all three quantities available.
    pub fn len(&self) -> usize {
        self.pt.len().min(self.eta.len()).min(self.phi.len())
    }

    /// True when any of the arrays is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Label rung for a light jet overlapping a b-jet, given the number of truth
/// jets found around the pair.
///
/// Exactly one or no truth jet keeps rung 1, exactly two gives 2, three or
/// more saturate at 3.
pub fn overlap_rung(n_truth_jets: usize) -> i32 {
    match n_truth_jets {
        2 => 2,
        n if n >= 3 => 3,
        _ => 1,
    }
}

/// Enhanced truth label per reco jet.
///
/// | Label | Meaning |
/// |-------|---------|
/// | 0 | light jet, no b-jet within ΔR < 0.1 |
/// | 1 | light jet with a b-jet within 0.1, one truth jet (≥ 20 GeV) within 1.0 of the pair midpoint |
/// | 2 | as 1, two truth jets |
/// | 3 | as 1, three or more truth jets |
/// | 4 | charm jet (unchanged) |
/// | 5 | bottom jet (unchanged) |
///
/// The first b-jet in array order within the overlap cone is used.
pub fn enhanced_truth_label(
    labels: &[i32],
    jets: JetKinematics<'_>,
    truth_jets: JetKinematics<'_>,
) -> Vec<i32> {
    if labels.is_empty() || jets.is_empty() || truth_jets.is_empty() {
        return Vec::new();
    }

    let n_jets = labels.len().min(jets.len());
    labels[..n_jets]
        .iter()
        .enumerate()
        .map(|(i, &label)| {
            if label != LABEL_LIGHT {
                return label;
            }
            let overlapping_b = (0..n_jets).find(|&j| {
                j != i
                    && labels[j] == LABEL_BOTTOM
                    && delta_r(jets.eta[i], jets.phi[i], jets.eta[j], jets.phi[j])
                        < BJET_OVERLAP_CONE
            });
            let Some(j) = overlapping_b else {
                return label;
            };

            let center_eta = (jets.eta[i] + jets.eta[j]) / 2.0;
            let center_phi = (jets.phi[i] + jets.phi[j]) / 2.0;
            let n_truth = (0..truth_jets.len())
                .filter(|&t| truth_jets.pt[t] >= TRUTH_JET_MIN_PT)
                .filter(|&t| {
                    delta_r(center_eta, center_phi, truth_jets.eta[t], truth_jets.phi[t])
                        < TRUTH_JET_CONE
                })
                .count();
            overlap_rung(n_truth)
        })
        .collect()
}

/// Constituent category per jet from the truth origin of its selected tracks.
///
/// Truth origin codes: 3/4 → b-hadron decay, 5 → charm, ≥ 6 → tau or other
/// secondary. Precedence is B > C > tau/other > none; tracks failing
/// `track_selection` (zero) and indices outside the track arrays are ignored.
pub fn constituent_category(
    jet_track_idx: &[Vec<i32>],
    track_origin: &[i32],
    track_selection: &[i32],
) -> Vec<i32> {
    if jet_track_idx.is_empty() || track_origin.is_empty() || track_selection.is_empty() {
        return Vec::new();
    }

    jet_track_idx
        .iter()
        .map(|track_indices| {
            let mut category = CATEGORY_NONE;
            for &idx in track_indices {
                let Ok(idx) = usize::try_from(idx) else { continue };
                let (Some(&origin), Some(&selected)) =
                    (track_origin.get(idx), track_selection.get(idx))
                else {
                    continue;
                };
                if selected == 0 {
                    continue;
                }
                if origin == 3 || origin == 4 {
                    category = CATEGORY_B;
                } else if category != CATEGORY_B && origin == 5 {
                    category = CATEGORY_C;
                } else if category > CATEGORY_C && origin >= 6 {
                    category = CATEGORY_TAU_OTHER;
                }
            }
            category
        })
        .collect()
}
