//! YAML run configuration.
//!
//! ```yaml
//! input:
//!   base_path: /data/ntuples
//!   files: "user.*.parquet"
//!   max_events_per_file: 10000
//! output:
//!   base_path: /data/out
//!   path: mu200
//! defines: [ftag_pileup_track, ftag_pileup_jet_truth, timing, track_jet_association]
//! objects:
//!   jets:
//!     source_format: vector
//!     branches: [AntiKt4EMTopoJets_pt, AntiKt4EMTopoJets_eta]
//!     event_number: true
//! collections:
//!   tracks:
//!     max_objects: 40
//!     branches: [Track_pt, Track_z0]
//!     selection: Track_GN2HL_selection
//!     object_link: { object: jets, link: AntiKt4EMTopoJets_btagTrack_idx }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use ep_core::{Error, Result};

use crate::defines::DefineSet;

/// Complete run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Input files.
    pub input: InputConfig,
    /// Output location.
    pub output: OutputConfig,
    /// Define sets applied to every input file, in order.
    #[serde(default)]
    pub defines: Vec<String>,
    /// Jet → track association table settings.
    #[serde(default)]
    pub association: AssociationConfig,
    /// Per-object datasets.
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectConfig>,
    /// Fixed-size object collection datasets.
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionConfig>,
    /// Slurm job settings.
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Input file selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Directory the `files` pattern is relative to.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Glob pattern of input Parquet files.
    pub files: String,
    /// Read at most this many events per file.
    #[serde(default)]
    pub max_events_per_file: Option<usize>,
    /// Scalar column holding the event number.
    #[serde(default = "default_event_number_column")]
    pub event_number_column: String,
    /// Input files after globbing (or the command-line override).
    #[serde(skip)]
    pub resolved: Vec<PathBuf>,
}

fn default_event_number_column() -> String {
    "eventNumber".to_string()
}

/// Output location: `<base_path>/<path>[/<subfolder>]/output_NNN/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Optional prefix of `path`.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Output directory.
    pub path: PathBuf,
    /// Extra subfolder, set from the command line.
    #[serde(skip)]
    pub subfolder: Option<String>,
}

/// Jet → track association table settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssociationConfig {
    /// Per-jet track index lists.
    pub jet_tracks: String,
    /// Name of the derived table column.
    pub output: String,
    /// Rows of the table.
    pub max_jets: usize,
    /// Columns of the table.
    pub max_tracks_per_jet: usize,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            jet_tracks: "AntiKt4EMTopoJets_btagTrack_idx".to_string(),
            output: "AntiKt4EMTopoJets_track_table".to_string(),
            max_jets: 20,
            max_tracks_per_jet: 40,
        }
    }
}

/// How an object's branches are laid out in the event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// One list entry per object per event.
    Vector,
    /// One value per event.
    Scalar,
}

/// A dataset with one row per object (or per event for scalars).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectConfig {
    /// Branch layout.
    pub source_format: SourceFormat,
    /// Branches to export.
    pub branches: Vec<String>,
    /// Repeat the event number on every row.
    #[serde(default)]
    pub event_number: bool,
    /// Per-object flag branch; objects with a false flag are dropped.
    #[serde(default)]
    pub selection: Option<String>,
    /// Set when a collection links to this object.
    #[serde(skip)]
    pub store_length: bool,
}

/// Link from a collection to the parent object it is grouped by.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectLink {
    /// Parent object name.
    pub object: String,
    /// Per-parent index list branch into the collection's branches.
    pub link: String,
}

/// A dataset with one fixed-size row per parent object (or per event).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// Row width; shorter rows are zero-padded and marked invalid.
    pub max_objects: usize,
    /// Branches to export.
    pub branches: Vec<String>,
    /// Per-object flag branch; objects with a false flag are dropped before padding.
    #[serde(default)]
    pub selection: Option<String>,
    /// Parent object grouping.
    #[serde(default)]
    pub object_link: Option<ObjectLink>,
}

/// Slurm job settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Job name prefix.
    pub name: String,
    /// Wall time limit.
    pub time: String,
    /// Memory per job in GB.
    pub memory_gb: u32,
    /// Slurm partition.
    pub partition: Option<String>,
    /// Slurm account.
    pub account: Option<String>,
    /// CPUs per task.
    pub cpu_count: u32,
    /// Submit at most this many jobs.
    pub max_files: Option<usize>,
    /// Shell lines run before the conversion (environment setup).
    pub setup: Vec<String>,
    /// Binary invoked by the job.
    pub executable: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            name: "evprep".to_string(),
            time: "00:30:00".to_string(),
            memory_gb: 4,
            partition: None,
            account: None,
            cpu_count: 1,
            max_files: None,
            setup: Vec::new(),
            executable: "evprep".to_string(),
        }
    }
}

impl RunConfig {
    /// Parse and validate a configuration. Input files are not resolved.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mut config: RunConfig = serde_yaml_ng::from_str(text)?;
        config.mark_linked_objects();
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and resolve its input files.
    ///
    /// `input` replaces the configured glob with a single file; `subfolder`
    /// is appended to the output directory.
    pub fn load(path: &Path, input: Option<&Path>, subfolder: Option<&str>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&text)?;
        config.output.subfolder = subfolder.map(str::to_string);
        match input {
            Some(file) => config.input.resolved = vec![file.to_path_buf()],
            None => config.resolve_inputs()?,
        }
        tracing::debug!(
            config = %path.display(),
            inputs = config.input.resolved.len(),
            output = %config.output_dir().display(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Glob `input.files` under `input.base_path`, sorted.
    pub fn resolve_inputs(&mut self) -> Result<()> {
        let pattern = match &self.input.base_path {
            Some(base) => base.join(&self.input.files),
            None => PathBuf::from(&self.input.files),
        };
        let pattern = pattern.to_string_lossy().into_owned();
        let entries = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid input pattern '{pattern}': {e}")))?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) => files.push(path),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable input path"),
            }
        }
        files.sort();
        if files.is_empty() {
            return Err(Error::Config(format!("no input files match '{pattern}'")));
        }
        self.input.resolved = files;
        Ok(())
    }

    /// Parsed define sets, in configuration order.
    pub fn define_sets(&self) -> Result<Vec<DefineSet>> {
        self.defines.iter().map(|d| d.parse()).collect()
    }

    /// Directory holding the per-file output directories.
    pub fn output_dir(&self) -> PathBuf {
        let mut dir = match &self.output.base_path {
            Some(base) => base.join(&self.output.path),
            None => self.output.path.clone(),
        };
        if let Some(sub) = &self.output.subfolder {
            dir.push(sub);
        }
        dir
    }

    /// Output directory of input file `index`.
    pub fn file_output_dir(&self, index: usize) -> PathBuf {
        self.output_dir().join(format!("output_{index:03}"))
    }

    /// Names of every dataset written per input file: objects, then collections.
    pub fn dataset_names(&self) -> Vec<String> {
        self.objects.keys().chain(self.collections.keys()).cloned().collect()
    }

    fn mark_linked_objects(&mut self) {
        for collection in self.collections.values() {
            if let Some(link) = &collection.object_link {
                if let Some(object) = self.objects.get_mut(&link.object) {
                    object.store_length = true;
                }
            }
        }
    }

    /// Semantic checks beyond what the YAML schema enforces.
    pub fn validate(&self) -> Result<()> {
        self.define_sets()?;

        let a = &self.association;
        if a.max_jets == 0 || a.max_tracks_per_jet == 0 {
            return Err(Error::Config(
                "association: max_jets and max_tracks_per_jet must be positive".into(),
            ));
        }

        for (name, object) in &self.objects {
            if object.branches.is_empty() {
                return Err(Error::Config(format!("object '{name}' has no branches")));
            }
        }

        for (name, collection) in &self.collections {
            if self.objects.contains_key(name) {
                return Err(Error::Config(format!(
                    "'{name}' is defined both as an object and as a collection"
                )));
            }
            if collection.max_objects == 0 {
                return Err(Error::Config(format!("collection '{name}': max_objects must be positive")));
            }
            if collection.branches.is_empty() {
                return Err(Error::Config(format!("collection '{name}' has no branches")));
            }
            if let Some(link) = &collection.object_link {
                let object = self.objects.get(&link.object).ok_or_else(|| {
                    Error::Config(format!(
                        "collection '{name}' links to undefined object '{}'",
                        link.object
                    ))
                })?;
                if object.source_format != SourceFormat::Vector {
                    return Err(Error::Config(format!(
                        "collection '{name}' links to scalar object '{}'",
                        link.object
                    )));
                }
            }
        }
        Ok(())
    }
}
