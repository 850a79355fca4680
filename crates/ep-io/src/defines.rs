//! Named sets of derived columns.
//!
//! Each [`DefineSet`] reads a fixed group of input branches, runs the
//! `ep-derive` transforms event by event and appends the results to the
//! [`EventTable`]. Sets are applied in configuration order, so a set may
//! consume columns produced by an earlier one (the jet truth set reads
//! `Track_GN2HL_selection`).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{FixedSizeListArray, Int32Array};
use arrow::datatypes::{DataType, Field};

use ep_core::{Error, JaggedCol, Result};
use ep_derive::selection::{
    JET_SELECTION_PT_CUT, above_threshold, both_are_one, gn2hl_selection, jet_selection, pass_pt,
    track_good_within_eta, track_is_good_from_hs,
};
use ep_derive::vertex::{
    min_delta_z, min_significance_vertex_offset, min_z0_significance,
    n_vertices_within_significance, vertex_offset_significance,
};
use ep_derive::{
    JetKinematics, VertexPosition, VertexSubset, associate_tracks_to_jets, cell_time_tof_corrected,
    constituent_category, enhanced_truth_label, hs_vertex_value, primary_vertex_index,
};

use crate::config::AssociationConfig;
use crate::table::{EventTable, storage_err};

const JETS: &str = "AntiKt4EMTopoJets";

/// A named group of derived columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefineSet {
    /// Primary vertex index and track / pile-up vertex association quantities.
    FtagPileupTrack,
    /// Jet constituent category, enhanced truth label and a 20 GeV flag.
    FtagPileupJetTruth,
    /// Hard-scatter vertex values, cell / track / jet flags and cell TOF correction.
    Timing,
    /// Padded jet → track index table.
    TrackJetAssociation,
}

impl DefineSet {
    /// All sets, in their natural application order.
    pub const ALL: [DefineSet; 4] = [
        DefineSet::FtagPileupTrack,
        DefineSet::FtagPileupJetTruth,
        DefineSet::Timing,
        DefineSet::TrackJetAssociation,
    ];

    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            DefineSet::FtagPileupTrack => "ftag_pileup_track",
            DefineSet::FtagPileupJetTruth => "ftag_pileup_jet_truth",
            DefineSet::Timing => "timing",
            DefineSet::TrackJetAssociation => "track_jet_association",
        }
    }

    /// Names of the columns this set appends.
    pub fn output_columns(self, association: &AssociationConfig) -> Vec<String> {
        let names: &[&str] = match self {
            DefineSet::FtagPileupTrack => &[
                "iPV",
                "Track_minDz_PUvtx",
                "Track_minDzsig_PUvtx",
                "Track_minDz_PUvtx_dz",
                "Track_minDz_PUvtx_dzsig",
                "Track_NVtxIn1sig",
                "Track_NVtxIn3sig",
                "Track_NVtxIn5sig",
                "Track_GN2HL_selection",
            ],
            DefineSet::FtagPileupJetTruth => &[
                "AntiKt4EMTopoJets_ConstituentCategory",
                "AntiKt4EMTopoJets_EnhancedTruthLabelID",
                "AntiKt4EMTopoJets_Pt20GeV",
            ],
            DefineSet::Timing => &[
                "HSvertex_time",
                "HSvertex_x",
                "HSvertex_y",
                "HSvertex_z",
                "HSvertex_reco_x",
                "HSvertex_reco_y",
                "HSvertex_reco_z",
                "Cell_above_2GeV",
                "Cell_above_1GeV",
                "Cell_above_4_significance",
                "Sig_above_3_celle_above_1GeV",
                "Sig_above_4_celle_above_1GeV",
                "Cell_time_TOF_corrected",
                "Track_isGoodFromHS",
                "Track_eta_IsGoodwithin_2p5",
                "Track_above_1GeV",
                "AntiKt4EMTopoJets_selected",
            ],
            DefineSet::TrackJetAssociation => return vec![association.output.clone()],
        };
        names.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for DefineSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DefineSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DefineSet::ALL.into_iter().find(|d| d.name() == s).ok_or_else(|| {
            let known: Vec<&str> = DefineSet::ALL.iter().map(|d| d.name()).collect();
            Error::Config(format!("unknown define set '{s}' (known: {})", known.join(", ")))
        })
    }
}

/// Apply `sets` in order, appending their columns to `table`.
pub fn apply_defines(
    table: &mut EventTable,
    sets: &[DefineSet],
    association: &AssociationConfig,
) -> Result<()> {
    for set in sets {
        tracing::info!(define = %set, events = table.n_events(), "applying define set");
        match set {
            DefineSet::FtagPileupTrack => ftag_pileup_track(table)?,
            DefineSet::FtagPileupJetTruth => ftag_pileup_jet_truth(table)?,
            DefineSet::Timing => timing(table)?,
            DefineSet::TrackJetAssociation => track_jet_association(table, association)?,
        }
    }
    Ok(())
}

fn per_event<U>(n_events: usize, f: impl FnMut(usize) -> Vec<U>) -> JaggedCol<U> {
    JaggedCol::from_rows((0..n_events).map(f))
}

fn ftag_pileup_track(table: &mut EventTable) -> Result<()> {
    let n = table.n_events();
    let vtx_is_hs = table.bool_lists("RecoVtx_isHS")?;
    let vtx_z = table.f64_lists("RecoVtx_z")?;
    let z0 = table.f64_lists("Track_z0")?;
    let var_z0 = table.f64_lists("Track_var_z0")?;
    let d0 = table.f64_lists("Track_btagIp_d0")?;
    let z0_sin_theta = table.f64_lists("Track_btagIp_z0SinTheta")?;
    let pt = table.f64_lists("Track_pt")?;
    let eta = table.f64_lists("Track_eta")?;
    let quality = table.i32_lists("Track_quality")?;

    let pileup: Vec<VertexSubset> = (0..n)
        .map(|ev| VertexSubset::from_primary(primary_vertex_index(vtx_is_hs.row(ev)), true))
        .collect();
    let ipv: Vec<i32> = pileup.iter().map(|s| s.primary().map_or(-1, |pv| pv as i32)).collect();

    let min_dz = per_event(n, |ev| min_delta_z(z0.row(ev), vtx_z.row(ev), pileup[ev]));
    let min_dzsig = per_event(n, |ev| {
        min_z0_significance(z0.row(ev), var_z0.row(ev), vtx_z.row(ev), pileup[ev])
    });
    let offset = per_event(n, |ev| {
        min_significance_vertex_offset(z0.row(ev), var_z0.row(ev), vtx_z.row(ev), pileup[ev])
    });
    let offset_sig = per_event(n, |ev| vertex_offset_significance(offset.row(ev), var_z0.row(ev)));
    let gn2hl = per_event(n, |ev| {
        gn2hl_selection(d0.row(ev), z0_sin_theta.row(ev), pt.row(ev), eta.row(ev), quality.row(ev))
    });

    table.push_scalar_i32("iPV", ipv)?;
    table.push_f64_lists("Track_minDz_PUvtx", &min_dz)?;
    table.push_f64_lists("Track_minDzsig_PUvtx", &min_dzsig)?;
    table.push_f64_lists("Track_minDz_PUvtx_dz", &offset)?;
    table.push_f64_lists("Track_minDz_PUvtx_dzsig", &offset_sig)?;
    for (cut, name) in [(1.0, "Track_NVtxIn1sig"), (3.0, "Track_NVtxIn3sig"), (5.0, "Track_NVtxIn5sig")]
    {
        let counts = per_event(n, |ev| {
            n_vertices_within_significance(vtx_z.row(ev), z0.row(ev), var_z0.row(ev), cut)
        });
        table.push_i32_lists(name, &counts)?;
    }
    table.push_i32_lists("Track_GN2HL_selection", &gn2hl)?;
    Ok(())
}

fn ftag_pileup_jet_truth(table: &mut EventTable) -> Result<()> {
    let n = table.n_events();
    let track_idx = table.index_lists(&format!("{JETS}_btagTrack_idx"))?;
    let origin = table.i32_lists("Track_ftagTruthOriginLabel")?;
    let gn2hl = table.i32_lists("Track_GN2HL_selection")?;
    let labels = table.i32_lists(&format!("{JETS}_HadronConeExclTruthLabelID"))?;
    let pt = table.f64_lists(&format!("{JETS}_pt"))?;
    let eta = table.f64_lists(&format!("{JETS}_eta"))?;
    let phi = table.f64_lists(&format!("{JETS}_phi"))?;
    let truth_pt = table.f64_lists("TruthHSJet_pt")?;
    let truth_eta = table.f64_lists("TruthHSJet_eta")?;
    let truth_phi = table.f64_lists("TruthHSJet_phi")?;

    let category =
        per_event(n, |ev| constituent_category(track_idx.row(ev), origin.row(ev), gn2hl.row(ev)));
    let enhanced = per_event(n, |ev| {
        enhanced_truth_label(
            labels.row(ev),
            JetKinematics::new(pt.row(ev), eta.row(ev), phi.row(ev)),
            JetKinematics::new(truth_pt.row(ev), truth_eta.row(ev), truth_phi.row(ev)),
        )
    });
    let pt20 = per_event(n, |ev| pass_pt(pt.row(ev), 20.0));

    table.push_i32_lists(&format!("{JETS}_ConstituentCategory"), &category)?;
    table.push_i32_lists(&format!("{JETS}_EnhancedTruthLabelID"), &enhanced)?;
    table.push_i32_lists(&format!("{JETS}_Pt20GeV"), &pt20)?;
    Ok(())
}

fn hs_values(table: &EventTable, prefix: &str, quantity: &str) -> Result<Vec<f64>> {
    let is_hs = table.bool_lists(&format!("{prefix}_isHS"))?;
    let values = table.f64_lists(&format!("{prefix}_{quantity}"))?;
    Ok((0..table.n_events()).map(|ev| hs_vertex_value(values.row(ev), is_hs.row(ev))).collect())
}

fn timing(table: &mut EventTable) -> Result<()> {
    let n = table.n_events();

    let truth_time = hs_values(table, "TruthVtx", "time")?;
    let truth_x = hs_values(table, "TruthVtx", "x")?;
    let truth_y = hs_values(table, "TruthVtx", "y")?;
    let truth_z = hs_values(table, "TruthVtx", "z")?;
    let reco_x = hs_values(table, "RecoVtx", "x")?;
    let reco_y = hs_values(table, "RecoVtx", "y")?;
    let reco_z = hs_values(table, "RecoVtx", "z")?;

    let cell_e = table.f64_lists("Cell_e")?;
    let cell_sig = table.f64_lists("Cell_significance")?;
    let cell_time = table.f64_lists("Cell_time")?;
    let cell_x = table.f64_lists("Cell_x")?;
    let cell_y = table.f64_lists("Cell_y")?;
    let cell_z = table.f64_lists("Cell_z")?;

    let track_quality = table.bool_lists("Track_quality")?;
    let track_origin = table.i32_lists("Track_ftagTruthOriginLabel")?;
    let track_eta = table.f64_lists("Track_eta")?;
    let track_pt = table.f64_lists("Track_pt")?;

    let jet_pt = table.f64_lists(&format!("{JETS}_pt"))?;
    let jet_truth_idx = table.index_lists(&format!("{JETS}_truthHSJet_idx"))?;

    let above_1 = per_event(n, |ev| above_threshold(cell_e.row(ev), 1.0));
    let above_2 = per_event(n, |ev| above_threshold(cell_e.row(ev), 2.0));
    let sig_above_4 = per_event(n, |ev| above_threshold(cell_sig.row(ev), 4.0));
    let sig_3_e_1 = per_event(n, |ev| {
        both_are_one(above_1.row(ev), &above_threshold(cell_sig.row(ev), 3.0))
    });
    let sig_4_e_1 = per_event(n, |ev| both_are_one(above_1.row(ev), sig_above_4.row(ev)));

    // Corrected to the reconstructed hard-scatter vertex; its time is unknown.
    let tof = per_event(n, |ev| {
        cell_time_tof_corrected(
            cell_time.row(ev),
            cell_x.row(ev),
            cell_y.row(ev),
            cell_z.row(ev),
            VertexPosition::new(reco_x[ev], reco_y[ev], reco_z[ev]),
            None,
        )
    });

    let good_from_hs =
        per_event(n, |ev| track_is_good_from_hs(track_quality.row(ev), track_origin.row(ev)));
    let good_eta =
        per_event(n, |ev| track_good_within_eta(track_quality.row(ev), track_eta.row(ev), 2.5));
    let track_above_1 = per_event(n, |ev| above_threshold(track_pt.row(ev), 1.0));
    let jet_selected = per_event(n, |ev| {
        jet_selection(jet_pt.row(ev), jet_truth_idx.row(ev), JET_SELECTION_PT_CUT)
    });

    table.push_scalar_f64("HSvertex_time", truth_time)?;
    table.push_scalar_f64("HSvertex_x", truth_x)?;
    table.push_scalar_f64("HSvertex_y", truth_y)?;
    table.push_scalar_f64("HSvertex_z", truth_z)?;
    table.push_scalar_f64("HSvertex_reco_x", reco_x)?;
    table.push_scalar_f64("HSvertex_reco_y", reco_y)?;
    table.push_scalar_f64("HSvertex_reco_z", reco_z)?;
    table.push_i32_lists("Cell_above_2GeV", &above_2)?;
    table.push_i32_lists("Cell_above_1GeV", &above_1)?;
    table.push_i32_lists("Cell_above_4_significance", &sig_above_4)?;
    table.push_i32_lists("Sig_above_3_celle_above_1GeV", &sig_3_e_1)?;
    table.push_i32_lists("Sig_above_4_celle_above_1GeV", &sig_4_e_1)?;
    table.push_f64_lists("Cell_time_TOF_corrected", &tof)?;
    table.push_bool_lists("Track_isGoodFromHS", &good_from_hs)?;
    table.push_bool_lists("Track_eta_IsGoodwithin_2p5", &good_eta)?;
    table.push_i32_lists("Track_above_1GeV", &track_above_1)?;
    table.push_bool_lists(&format!("{JETS}_selected"), &jet_selected)?;
    Ok(())
}

fn track_jet_association(table: &mut EventTable, association: &AssociationConfig) -> Result<()> {
    let jet_tracks = table.index_lists(&association.jet_tracks)?;
    let (max_jets, max_tracks) = (association.max_jets, association.max_tracks_per_jet);
    let width = max_jets * max_tracks;

    let mut flat = Vec::with_capacity(width * table.n_events());
    for ev in 0..table.n_events() {
        let tables = associate_tracks_to_jets(jet_tracks.row(ev), max_jets, max_tracks);
        flat.extend_from_slice(tables.as_flat());
    }

    let size = i32::try_from(width)
        .map_err(|_| Error::Config(format!("association table of {width} slots is too large")))?;
    let item = Arc::new(Field::new("item", DataType::Int32, true));
    let array = FixedSizeListArray::try_new(item, size, Arc::new(Int32Array::from(flat)), None)
        .map_err(storage_err)?;
    table.push_column(&association.output, Arc::new(array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use arrow::array::{Array, AsArray, BooleanBuilder, Float64Builder, Int32Builder, ListBuilder};
    use arrow::datatypes::Int32Type;
    use arrow::record_batch::RecordBatch;

    fn f64_col(rows: &[&[f64]]) -> arrow::array::ArrayRef {
        let mut b = ListBuilder::new(Float64Builder::new());
        for r in rows {
            b.values().append_slice(r);
            b.append(true);
        }
        Arc::new(b.finish())
    }

    fn i32_col(rows: &[&[i32]]) -> arrow::array::ArrayRef {
        let mut b = ListBuilder::new(Int32Builder::new());
        for r in rows {
            b.values().append_slice(r);
            b.append(true);
        }
        Arc::new(b.finish())
    }

    fn bool_col(rows: &[&[bool]]) -> arrow::array::ArrayRef {
        let mut b = ListBuilder::new(BooleanBuilder::new());
        for r in rows {
            b.values().append_slice(r);
            b.append(true);
        }
        Arc::new(b.finish())
    }

    fn idx_col(rows: &[&[&[i32]]]) -> arrow::array::ArrayRef {
        let mut b = ListBuilder::new(ListBuilder::new(Int32Builder::new()));
        for r in rows {
            for inner in *r {
                b.values().values().append_slice(inner);
                b.values().append(true);
            }
            b.append(true);
        }
        Arc::new(b.finish())
    }

    /// One event: two vertices (HS at index 1), two tracks, two jets, one
    /// truth jet and two cells.
    fn one_event_table() -> EventTable {
        let batch = RecordBatch::try_from_iter(vec![
            ("RecoVtx_isHS", bool_col(&[&[false, true]])),
            ("RecoVtx_x", f64_col(&[&[0.0, 0.0]])),
            ("RecoVtx_y", f64_col(&[&[0.0, 0.0]])),
            ("RecoVtx_z", f64_col(&[&[4.0, 0.0]])),
            ("TruthVtx_isHS", bool_col(&[&[true]])),
            ("TruthVtx_time", f64_col(&[&[12.0]])),
            ("TruthVtx_x", f64_col(&[&[0.1]])),
            ("TruthVtx_y", f64_col(&[&[0.2]])),
            ("TruthVtx_z", f64_col(&[&[0.3]])),
            ("Track_z0", f64_col(&[&[1.0, 5.0]])),
            ("Track_var_z0", f64_col(&[&[1.0, 4.0]])),
            ("Track_btagIp_d0", f64_col(&[&[0.1, 0.1]])),
            ("Track_btagIp_z0SinTheta", f64_col(&[&[0.1, 0.1]])),
            ("Track_pt", f64_col(&[&[2.0, 0.8]])),
            ("Track_eta", f64_col(&[&[0.5, 3.0]])),
            ("Track_quality", i32_col(&[&[1, 1]])),
            ("Track_ftagTruthOriginLabel", i32_col(&[&[3, 0]])),
            ("AntiKt4EMTopoJets_pt", f64_col(&[&[40.0, 25.0]])),
            ("AntiKt4EMTopoJets_eta", f64_col(&[&[0.0, 0.05]])),
            ("AntiKt4EMTopoJets_phi", f64_col(&[&[0.0, 0.0]])),
            ("AntiKt4EMTopoJets_HadronConeExclTruthLabelID", i32_col(&[&[0, 5]])),
            ("AntiKt4EMTopoJets_btagTrack_idx", idx_col(&[&[&[0, 1], &[1]]])),
            ("AntiKt4EMTopoJets_truthHSJet_idx", idx_col(&[&[&[0], &[]]])),
            ("TruthHSJet_pt", f64_col(&[&[30.0]])),
            ("TruthHSJet_eta", f64_col(&[&[0.0]])),
            ("TruthHSJet_phi", f64_col(&[&[0.0]])),
            ("Cell_e", f64_col(&[&[0.5, 3.0]])),
            ("Cell_significance", f64_col(&[&[5.0, 3.5]])),
            ("Cell_time", f64_col(&[&[0.0, 0.0]])),
            ("Cell_x", f64_col(&[&[0.0, 1500.0]])),
            ("Cell_y", f64_col(&[&[0.0, 0.0]])),
            ("Cell_z", f64_col(&[&[3000.0, 0.0]])),
        ])
        .unwrap();
        EventTable::from_record_batch(&batch)
    }

    #[test]
    fn test_define_set_names() {
        for set in DefineSet::ALL {
            assert_eq!(set.name().parse::<DefineSet>().unwrap(), set);
        }
        assert!(matches!("nope".parse::<DefineSet>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_all_sets_produce_their_columns() {
        let mut table = one_event_table();
        let assoc = AssociationConfig::default();
        apply_defines(&mut table, &DefineSet::ALL, &assoc).unwrap();
        for set in DefineSet::ALL {
            for col in set.output_columns(&assoc) {
                assert!(table.has_column(&col), "missing {col}");
            }
        }
    }

    #[test]
    fn test_ftag_pileup_track_values() {
        let mut table = one_event_table();
        apply_defines(&mut table, &[DefineSet::FtagPileupTrack], &AssociationConfig::default())
            .unwrap();

        assert_eq!(table.scalar_i64("iPV").unwrap(), vec![1]);
        // Only the pile-up vertex at z = 4 is a candidate.
        assert_eq!(table.f64_lists("Track_minDz_PUvtx").unwrap().row(0), &[-3.0, 1.0]);
        assert_eq!(table.f64_lists("Track_minDz_PUvtx_dz").unwrap().row(0), &[4.0, 4.0]);
        let dzsig = table.f64_lists("Track_minDz_PUvtx_dzsig").unwrap();
        assert_relative_eq!(dzsig.row(0)[1], 2.0, epsilon = 1e-12);
        assert_eq!(table.i32_lists("Track_NVtxIn1sig").unwrap().row(0), &[0, 1]);
        assert_eq!(table.i32_lists("Track_NVtxIn5sig").unwrap().row(0), &[2, 2]);
        assert_eq!(table.i32_lists("Track_GN2HL_selection").unwrap().row(0), &[1, 1]);
    }

    #[test]
    fn test_jet_truth_and_timing_values() {
        let mut table = one_event_table();
        let sets = [DefineSet::FtagPileupTrack, DefineSet::FtagPileupJetTruth, DefineSet::Timing];
        apply_defines(&mut table, &sets, &AssociationConfig::default()).unwrap();

        assert_eq!(table.i32_lists("AntiKt4EMTopoJets_ConstituentCategory").unwrap().row(0), &[0, 3]);
        assert_eq!(table.i32_lists("AntiKt4EMTopoJets_EnhancedTruthLabelID").unwrap().row(0), &[1, 5]);
        assert_eq!(table.i32_lists("AntiKt4EMTopoJets_Pt20GeV").unwrap().row(0), &[1, 1]);

        assert_eq!(table.scalar_f64("HSvertex_time").unwrap(), vec![12.0]);
        assert_eq!(table.scalar_f64("HSvertex_reco_z").unwrap(), vec![0.0]);
        assert_eq!(table.i32_lists("Cell_above_1GeV").unwrap().row(0), &[0, 1]);
        assert_eq!(table.i32_lists("Sig_above_3_celle_above_1GeV").unwrap().row(0), &[0, 1]);
        assert_eq!(table.i32_lists("Sig_above_4_celle_above_1GeV").unwrap().row(0), &[0, 0]);
        let tof = table.f64_lists("Cell_time_TOF_corrected").unwrap();
        assert_relative_eq!(tof.row(0)[0], 0.0, epsilon = 1e-9);
        assert_eq!(table.bool_lists("Track_isGoodFromHS").unwrap().row(0), &[true, false]);
        assert_eq!(table.bool_lists("Track_eta_IsGoodwithin_2p5").unwrap().row(0), &[true, false]);
        assert_eq!(table.i32_lists("Track_above_1GeV").unwrap().row(0), &[1, 0]);
        assert_eq!(table.bool_lists("AntiKt4EMTopoJets_selected").unwrap().row(0), &[true, false]);
    }

    #[test]
    fn test_jet_truth_needs_track_selection() {
        let mut table = one_event_table();
        let err = apply_defines(
            &mut table,
            &[DefineSet::FtagPileupJetTruth],
            &AssociationConfig::default(),
        );
        assert!(matches!(err, Err(Error::MissingColumn(c)) if c == "Track_GN2HL_selection"));
    }

    #[test]
    fn test_track_jet_association_column() {
        let mut table = one_event_table();
        let assoc = AssociationConfig { max_jets: 3, max_tracks_per_jet: 2, ..Default::default() };
        apply_defines(&mut table, &[DefineSet::TrackJetAssociation], &assoc).unwrap();

        let col = table.column(&assoc.output).unwrap();
        let list = col.as_fixed_size_list();
        assert_eq!(list.value_length(), 6);
        let row = list.value(0);
        let values: Vec<i32> = row.as_primitive::<Int32Type>().values().to_vec();
        assert_eq!(values, vec![0, 1, 1, -1, -1, -1]);
        assert_eq!(list.len(), 1);
    }
}
