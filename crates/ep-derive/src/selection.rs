//! Threshold selections for tracks, jets and calorimeter cells.
//!
//! Integer-valued flags (`0`/`1`) are used where the flag is later combined
//! with other flags or stored next to other integer columns; plain `bool`
//! where the flag is a final per-object decision.

/// Default pt cut (GeV) of the composite jet selection.
pub const JET_SELECTION_PT_CUT: f64 = 30.0;

/// `1` where `pt > cut`.
pub fn pass_pt(pt: &[f64], cut: f64) -> Vec<i32> {
    pt.iter().map(|&v| i32::from(v > cut)).collect()
}

/// `1` where `value > threshold` (cell energy, cell significance, track pt).
pub fn above_threshold(values: &[f64], threshold: f64) -> Vec<i32> {
    values.iter().map(|&v| i32::from(v > threshold)).collect()
}

/// `1` where `|eta| <= max_abs_eta`.
pub fn within_eta(eta: &[f64], max_abs_eta: f64) -> Vec<i32> {
    eta.iter().map(|&v| i32::from(v.abs() <= max_abs_eta)).collect()
}

/// `1` where both flags are `1`, over the common length of the inputs.
pub fn both_are_one(first: &[i32], second: &[i32]) -> Vec<i32> {
    first.iter().zip(second).map(|(&a, &b)| i32::from(a == 1 && b == 1)).collect()
}

/// Good-quality track with a non-zero truth origin (i.e. not pile-up / fake).
pub fn track_is_good_from_hs(quality: &[bool], truth_origin: &[i32]) -> Vec<bool> {
    quality.iter().zip(truth_origin).map(|(&q, &origin)| q && origin != 0).collect()
}

/// Good-quality track inside `|eta| <= max_abs_eta`.
pub fn track_good_within_eta(quality: &[bool], eta: &[f64], max_abs_eta: f64) -> Vec<bool> {
    quality.iter().zip(eta).map(|(&q, &e)| q && e.abs() <= max_abs_eta).collect()
}

/// Loose track selection used for GN2 flavour-tagging training.
///
/// `|d0| <= 3.5`, `|z0 sin(theta)| < 5.0`, `pt >= 0.5`, `|eta| <= 4.0` and
/// `quality == 1`.
pub fn gn2hl_selection(
    d0: &[f64],
    z0_sin_theta: &[f64],
    pt: &[f64],
    eta: &[f64],
    quality: &[i32],
) -> Vec<i32> {
    if d0.is_empty()
        || z0_sin_theta.is_empty()
        || pt.is_empty()
        || eta.is_empty()
        || quality.is_empty()
    {
        return Vec::new();
    }

    let n = d0.len().min(z0_sin_theta.len()).min(pt.len()).min(eta.len()).min(quality.len());
    (0..n)
        .map(|i| {
            i32::from(
                d0[i].abs() <= 3.5
                    && z0_sin_theta[i].abs() < 5.0
                    && pt[i] >= 0.5
                    && eta[i].abs() <= 4.0
                    && quality[i] == 1,
            )
        })
        .collect()
}

/// Composite jet selection: `pt > pt_cut` and a non-empty truth-match list.
///
/// A jet without an entry in `truth_match_idx` fails.
pub fn jet_selection(pt: &[f64], truth_match_idx: &[Vec<i32>], pt_cut: f64) -> Vec<bool> {
    pt.iter()
        .enumerate()
        .map(|(i, &v)| {
            let has_truth_match = truth_match_idx.get(i).is_some_and(|m| !m.is_empty());
            v > pt_cut && has_truth_match
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_threshold_flags() {
        assert_eq!(pass_pt(&[10.0, 20.0, 20.5], 20.0), vec![0, 0, 1]);
        assert!(pass_pt(&[], 20.0).is_empty());
        assert_eq!(above_threshold(&[0.5, 1.0, 2.5], 1.0), vec![0, 0, 1]);
        assert_eq!(within_eta(&[-2.5, 2.6, 0.0], 2.5), vec![1, 0, 1]);
    }

    #[test]
    fn test_both_are_one_uses_common_length() {
        assert_eq!(both_are_one(&[1, 1, 0, 1], &[1, 0, 1]), vec![1, 0, 0]);
        assert_eq!(both_are_one(&[2], &[1]), vec![0]);
    }

    #[test]
    fn test_track_flags() {
        assert_eq!(
            track_is_good_from_hs(&[true, true, false], &[0, 2, 2]),
            vec![false, true, false]
        );
        assert_eq!(
            track_good_within_eta(&[true, true, false], &[2.4, -2.6, 0.0], 2.5),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_gn2hl_selection() {
        let d0 = [0.1, 3.6, 0.1, 0.1, 0.1, 0.1];
        let z0 = [0.1, 0.1, 5.0, 0.1, 0.1, 0.1];
        let pt = [1.0, 1.0, 1.0, 0.4, 1.0, 0.5];
        let eta = [0.0, 0.0, 0.0, 0.0, 4.1, -4.0];
        let quality = [1, 1, 1, 1, 1, 1];
        assert_eq!(gn2hl_selection(&d0, &z0, &pt, &eta, &quality), vec![1, 0, 0, 0, 0, 1]);
        assert_eq!(gn2hl_selection(&d0[..1], &z0[..1], &pt[..1], &eta[..1], &[0]), vec![0]);
        assert!(gn2hl_selection(&[], &z0, &pt, &eta, &quality).is_empty());
    }

    #[test]
    fn test_jet_selection() {
        let pt = [31.0, 31.0, 29.0, 45.0];
        let matches = vec![vec![0], vec![], vec![1]];
        assert_eq!(
            jet_selection(&pt, &matches, JET_SELECTION_PT_CUT),
            vec![true, false, false, false]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn prop_jet_selection_definition(
            jets in proptest::collection::vec((0.0f64..100.0, proptest::collection::vec(0i32..5, 0..3)), 0..10),
        ) {
            let pt: Vec<f64> = jets.iter().map(|(p, _)| *p).collect();
            let idx: Vec<Vec<i32>> = jets.iter().map(|(_, m)| m.clone()).collect();
            let sel = jet_selection(&pt, &idx, JET_SELECTION_PT_CUT);
            prop_assert_eq!(sel.len(), pt.len());
            for i in 0..pt.len() {
                prop_assert_eq!(sel[i], pt[i] > 30.0 && !idx[i].is_empty());
            }
        }
    }
}
