//! Human-readable per-event dump for cross-checking exported datasets.
//!
//! Prints the truth and reco hard-scatter vertices of the first events and
//! the jet selection outcome of every jet. Missing optional branches are
//! reported with a `-999` placeholder.

use std::io::Write;

use ep_core::{Error, JaggedCol, Result};
use ep_derive::selection::JET_SELECTION_PT_CUT;
use ep_derive::VertexPosition;

use crate::table::EventTable;

/// Selected jets beyond this count are truncated in the jet collection.
pub const EXPORTED_JET_CAP: usize = 20;

const MISSING: f64 = -999.0;

fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(Error::MissingColumn(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

struct Vertices {
    is_hs: JaggedCol<bool>,
    x: JaggedCol<f64>,
    y: JaggedCol<f64>,
    z: JaggedCol<f64>,
    time: Option<JaggedCol<f64>>,
}

impl Vertices {
    fn load(table: &EventTable, prefix: &str, with_time: bool) -> Result<Option<Self>> {
        let load = || -> Result<Self> {
            Ok(Self {
                is_hs: table.bool_lists(&format!("{prefix}_isHS"))?,
                x: table.f64_lists(&format!("{prefix}_x"))?,
                y: table.f64_lists(&format!("{prefix}_y"))?,
                z: table.f64_lists(&format!("{prefix}_z"))?,
                time: if with_time { Some(table.f64_lists(&format!("{prefix}_time"))?) } else { None },
            })
        };
        optional(load())
    }

    fn hard_scatter(&self, ev: usize) -> Option<(VertexPosition, f64)> {
        let is_hs = self.is_hs.row(ev);
        let pos = VertexPosition::hard_scatter(self.x.row(ev), self.y.row(ev), self.z.row(ev), is_hs)?;
        let time = self.time.as_ref().map_or(MISSING, |t| {
            is_hs.iter().position(|&h| h).and_then(|i| t.row(ev).get(i).copied()).unwrap_or(MISSING)
        });
        Some((pos, time))
    }
}

/// Write a summary of the first `n_events` events of `table`.
pub fn dump_events(table: &EventTable, n_events: usize, out: &mut dyn Write) -> Result<()> {
    let jets = "AntiKt4EMTopoJets";
    let pt = table.f64_lists(&format!("{jets}_pt"))?;
    let eta = optional(table.f64_lists(&format!("{jets}_eta")))?;
    let phi = optional(table.f64_lists(&format!("{jets}_phi")))?;
    let width = optional(table.f64_lists(&format!("{jets}_width")))?;
    let truth_idx = optional(table.index_lists(&format!("{jets}_truthHSJet_idx")))?;
    let event_number = optional(table.scalar_i64("eventNumber"))?;
    let truth = Vertices::load(table, "TruthVtx", true)?;
    let reco = Vertices::load(table, "RecoVtx", false)?;

    let value = |col: &Option<JaggedCol<f64>>, ev: usize, j: usize| {
        col.as_ref().map_or(MISSING, |c| c.get(ev, j, MISSING))
    };

    writeln!(out, "Events read: {}", table.n_events())?;
    let n = n_events.min(table.n_events());
    writeln!(out, "\n=== First {n} events ===")?;

    for ev in 0..n {
        match &event_number {
            Some(numbers) => writeln!(out, "\n--- Event {ev} (eventNumber: {}) ---", numbers[ev])?,
            None => writeln!(out, "\n--- Event {ev} ---")?,
        }

        let truth_hs = truth.as_ref().and_then(|v| v.hard_scatter(ev));
        let reco_hs = reco.as_ref().and_then(|v| v.hard_scatter(ev));
        writeln!(out, "HS vertex:")?;
        match truth_hs {
            Some((p, t)) => writeln!(
                out,
                "  truth: time={t:.3} ps, pos=({:.3}, {:.3}, {:.3})",
                p.x, p.y, p.z
            )?,
            None => writeln!(out, "  no truth HS vertex")?,
        }
        match reco_hs {
            Some((p, _)) => {
                writeln!(out, "  reco: pos=({:.3}, {:.3}, {:.3})", p.x, p.y, p.z)?;
                if let Some((t, _)) = truth_hs {
                    writeln!(out, "  truth-reco distance: {:.3} mm", t.distance_to(&p))?;
                }
            }
            None => writeln!(out, "  no reco HS vertex")?,
        }

        let jet_pt = pt.row(ev);
        writeln!(out, "Jets: {}", jet_pt.len())?;
        let mut selected = Vec::new();
        for (j, &jpt) in jet_pt.iter().enumerate() {
            let pass_pt = jpt > JET_SELECTION_PT_CUT;
            let matched = truth_idx
                .as_ref()
                .is_some_and(|m| m.row(ev).get(j).is_some_and(|l| !l.is_empty()));
            let pass = pass_pt && matched;
            writeln!(
                out,
                "  jet {j}: pt={jpt:.1}, eta={:.3}, phi={:.3}, width={:.3}, pt_cut={}, truth_match={}, selected={}",
                value(&eta, ev, j),
                value(&phi, ev, j),
                value(&width, ev, j),
                if pass_pt { "PASS" } else { "FAIL" },
                if matched { "YES" } else { "NO" },
                if pass { "YES" } else { "NO" },
            )?;
            if pass {
                selected.push(j);
            }
        }
        writeln!(out, "Selected jets: {}", selected.len())?;
        for (k, &j) in selected.iter().enumerate() {
            writeln!(
                out,
                "  selected {k} (jet {j}): pt={:.1}, eta={:.3}, phi={:.3}",
                jet_pt[j],
                value(&eta, ev, j),
                value(&phi, ev, j),
            )?;
        }
        if selected.len() > EXPORTED_JET_CAP {
            writeln!(out, "  NOTE: truncated to {EXPORTED_JET_CAP} jets in the jet collection")?;
        }
    }
    Ok(())
}
