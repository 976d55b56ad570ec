//! Drug gene-set analysis with the external MAGMA tool.
//!
//! Selects the bundled gene-set annotation for the requested drug set kind,
//! gene identifier scheme and conditioning mode, optionally filters it to a
//! minimum gene-set size, and runs `magma` once per kind.
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use tempfile::TempDir;

use crate::enrichment::CategoryKind;
use crate::error::MagmaError;
use crate::io::path_with_suffix;

pub const DEFAULT_SET_SIZE: usize = 2;
pub const MIN_SET_SIZE: usize = 2;
/// Leading fields of a gene-set annotation line before the first gene.
const SET_HEADER_FIELDS: usize = 3;

pub const GENE_RESULTS_SUFFIX: &str = ".genes.raw";
const WARNING_MARKER: &str = "WARNING:";

/// Drug gene-set collection analysed by one MAGMA run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeneSetKind {
    /// One gene set per individual drug
    Solo,
    Atc,
    Moa,
    Ind,
}

impl GeneSetKind {
    pub const ALL: [GeneSetKind; 4] = [
        GeneSetKind::Solo,
        GeneSetKind::Atc,
        GeneSetKind::Moa,
        GeneSetKind::Ind,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GeneSetKind::Solo => "solo",
            GeneSetKind::Atc => "atc",
            GeneSetKind::Moa => "moa",
            GeneSetKind::Ind => "ind",
        }
    }

    /// Suffix appended to the output prefix, e.g. `_SOLO`.
    pub fn label(&self) -> &'static str {
        match self {
            GeneSetKind::Solo => "_SOLO",
            GeneSetKind::Atc => "_ATC",
            GeneSetKind::Moa => "_MOA",
            GeneSetKind::Ind => "_IND",
        }
    }
}

impl From<CategoryKind> for GeneSetKind {
    fn from(kind: CategoryKind) -> Self {
        match kind {
            CategoryKind::Atc => GeneSetKind::Atc,
            CategoryKind::Moa => GeneSetKind::Moa,
            CategoryKind::Ind => GeneSetKind::Ind,
        }
    }
}

impl fmt::Display for GeneSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GeneSetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solo" => Ok(GeneSetKind::Solo),
            "atc" => Ok(GeneSetKind::Atc),
            "moa" => Ok(GeneSetKind::Moa),
            "ind" => Ok(GeneSetKind::Ind),
            other => Err(format!("unknown drug gene-set kind '{}'", other)),
        }
    }
}

/// Gene naming convention of the `.genes.raw` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneIdScheme {
    #[default]
    Entrez,
    /// Ensembl v105
    Ensembl,
    /// Ensembl v92, as produced by FUMA
    Ensembl92,
}

/// File name of the bundled gene-set annotation.
pub fn gene_set_file_name(kind: GeneSetKind, scheme: GeneIdScheme, conditional: bool) -> &'static str {
    use GeneIdScheme::*;
    use GeneSetKind::*;

    match (scheme, conditional, kind) {
        (Entrez, false, Solo) => "entrez_genesets.txt",
        (Entrez, false, Atc) => "atc_entrez_sets.txt",
        (Entrez, false, Moa) => "moa_entrez_sets.txt",
        (Entrez, false, Ind) => "ind_entrez_sets.txt",
        (Entrez, true, Solo) => "entrez_cond_sets.txt",
        (Entrez, true, Atc) => "atc_cond_sets.txt",
        (Entrez, true, Moa) => "moa_cond_sets.txt",
        (Entrez, true, Ind) => "ind_cond_sets.txt",
        (Ensembl, false, Solo) => "ensembl_genesets.txt",
        (Ensembl, false, Atc) => "atc_ensembl_sets.txt",
        (Ensembl, false, Moa) => "moa_ensembl_sets.txt",
        (Ensembl, false, Ind) => "ind_ensembl_sets.txt",
        (Ensembl, true, Solo) => "ensembl_cond_sets.txt",
        (Ensembl, true, Atc) => "atc_ensembl_cond_sets.txt",
        (Ensembl, true, Moa) => "moa_ensembl_cond_sets.txt",
        (Ensembl, true, Ind) => "ind_ensembl_cond_sets.txt",
        (Ensembl92, false, Solo) => "ensembl_genesets92.txt",
        (Ensembl92, false, Atc) => "atc_ensembl_sets92.txt",
        (Ensembl92, false, Moa) => "moa_ensembl_sets92.txt",
        (Ensembl92, false, Ind) => "ind_ensembl_sets92.txt",
        (Ensembl92, true, Solo) => "ensembl_cond_sets92.txt",
        (Ensembl92, true, Atc) => "atc_ensembl_cond_sets92.txt",
        (Ensembl92, true, Moa) => "moa_ensembl_cond_sets92.txt",
        (Ensembl92, true, Ind) => "ind_ensembl_cond_sets92.txt",
    }
}

/// `atc_entrez_sets.txt` -> `atc_entrez_sets_min5.txt`
pub fn filtered_file_name(file_name: &str, min_size: usize) -> String {
    let stem = file_name.strip_suffix(".txt").unwrap_or(file_name);
    format!("{}_min{}.txt", stem, min_size)
}

/// Copy the gene-set lines holding at least `min_size` genes. Returns the number kept.
pub fn filter_gene_sets_by_size<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    min_size: usize,
) -> io::Result<usize> {
    let mut kept = 0;
    for line in reader.lines() {
        let line = line?;
        let n_fields = line.trim_end_matches('\r').split('\t').count();
        if n_fields >= min_size + SET_HEADER_FIELDS {
            writeln!(writer, "{}", line)?;
            kept += 1;
        }
    }
    writer.flush()?;
    Ok(kept)
}

pub fn filter_gene_set_file(source: &Path, target: &Path, min_size: usize) -> io::Result<usize> {
    let reader = BufReader::new(File::open(source)?);
    let writer = BufWriter::new(File::create(target)?);
    filter_gene_sets_by_size(reader, writer, min_size)
}

/// Gene-set annotation files for one pipeline run.
///
/// Filtered copies live in a temporary directory removed on drop.
#[derive(Debug)]
pub struct GeneSetCollection {
    files: Vec<(GeneSetKind, PathBuf)>,
    _filtered_dir: Option<TempDir>,
}

impl GeneSetCollection {
    pub fn prepare(
        gene_set_dir: &Path,
        kinds: &[GeneSetKind],
        scheme: GeneIdScheme,
        conditional: bool,
        min_size: usize,
    ) -> Result<Self, MagmaError> {
        if min_size < MIN_SET_SIZE {
            return Err(MagmaError::InvalidSetSize {
                size: min_size,
                min: MIN_SET_SIZE,
            });
        }

        let filtered_dir = if min_size != DEFAULT_SET_SIZE {
            Some(tempfile::Builder::new().prefix("drugsets-").tempdir()?)
        } else {
            None
        };

        let mut files = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let name = gene_set_file_name(kind, scheme, conditional);
            let source = gene_set_dir.join(name);
            if !source.is_file() {
                return Err(MagmaError::GeneSetFileMissing(source));
            }

            let path = match &filtered_dir {
                Some(dir) => {
                    let target = dir.path().join(filtered_file_name(name, min_size));
                    let kept = filter_gene_set_file(&source, &target, min_size)?;
                    log::info!(
                        "{} gene sets with at least {} genes kept from {}",
                        kept,
                        min_size,
                        name
                    );
                    target
                }
                None => source,
            };
            files.push((kind, path));
        }

        Ok(GeneSetCollection {
            files,
            _filtered_dir: filtered_dir,
        })
    }

    pub fn path(&self, kind: GeneSetKind) -> Option<&Path> {
        self.files
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, path)| path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (GeneSetKind, &Path)> {
        self.files.iter().map(|(kind, path)| (*kind, path.as_path()))
    }
}

/// One `magma` gene-set analysis invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagmaRun {
    pub program: PathBuf,
    pub gene_results: PathBuf,
    pub set_annot: PathBuf,
    /// Condition on the set of all druggable genes
    pub conditional: bool,
    /// Output prefix including the analysis label
    pub out: PathBuf,
}

impl MagmaRun {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--gene-results".into(),
            self.gene_results.clone().into(),
            "--set-annot".into(),
            self.set_annot.clone().into(),
            "--settings".into(),
            "gene-info".into(),
        ];
        if self.conditional {
            args.push("--model".into());
            args.push("condition=druggable".into());
        }
        args.push("--out".into());
        args.push(self.out.clone().into());
        args
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args());
        command
    }

    pub fn log_path(&self) -> PathBuf {
        path_with_suffix(&self.out, ".log")
    }

    pub fn gsa_out_path(&self) -> PathBuf {
        path_with_suffix(&self.out, ".gsa.out")
    }

    /// Run MAGMA to completion, forwarding its stdout to the debug log.
    pub fn run(&self, label: &str) -> Result<(), MagmaError> {
        let program = self.program.display().to_string();
        log::debug!("running {:?}", self.command());

        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| MagmaError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                log::debug!("magma: {}", line?);
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(MagmaError::Failed {
                program,
                label: label.to_string(),
                status,
            });
        }
        Ok(())
    }
}

/// Number of `WARNING:` markers in a MAGMA log file.
pub fn count_log_warnings(log_path: &Path) -> io::Result<usize> {
    let text = fs::read_to_string(log_path)?;
    Ok(text.matches(WARNING_MARKER).count())
}

pub fn check_gene_results_path(path: &Path) -> Result<(), MagmaError> {
    let is_raw = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(GENE_RESULTS_SUFFIX));
    if is_raw {
        Ok(())
    } else {
        Err(MagmaError::GeneResultsFile(path.to_path_buf()))
    }
}

/// Individual drug results of an earlier run with output prefix `out_prefix`.
pub fn locate_gsa_results(out_prefix: &Path) -> Result<PathBuf, MagmaError> {
    let base = path_with_suffix(out_prefix, GeneSetKind::Solo.label());
    [".gsa.out", ".gsa.out.txt"]
        .iter()
        .map(|suffix| path_with_suffix(&base, suffix))
        .find(|path| path.is_file())
        .ok_or_else(|| MagmaError::MissingSoloResults(path_with_suffix(&base, ".gsa.out")))
}

/// Output prefix made absolute against the working directory.
pub fn resolve_out_prefix(out: &Path) -> io::Result<PathBuf> {
    std::path::absolute(out)
}

/// Settings of the gene-set analysis step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub magma: PathBuf,
    pub gene_results: PathBuf,
    pub out_prefix: PathBuf,
    /// Directory holding `GENESETS/`
    pub data_dir: PathBuf,
    pub kinds: Vec<GeneSetKind>,
    pub id_scheme: GeneIdScheme,
    pub conditional: bool,
    pub set_size: usize,
}

impl PipelineConfig {
    pub fn gene_set_dir(&self) -> PathBuf {
        self.data_dir.join("GENESETS")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub kind: GeneSetKind,
    pub gsa_out: PathBuf,
    pub log: PathBuf,
    pub warnings: usize,
}

/// Run one MAGMA gene-set analysis per requested kind.
pub fn run_gene_set_analyses(config: &PipelineConfig) -> Result<Vec<AnalysisOutcome>, MagmaError> {
    check_gene_results_path(&config.gene_results)?;
    let gene_results = std::path::absolute(&config.gene_results)?;
    let out_prefix = resolve_out_prefix(&config.out_prefix)?;

    let collection = GeneSetCollection::prepare(
        &config.gene_set_dir(),
        &config.kinds,
        config.id_scheme,
        config.conditional,
        config.set_size,
    )?;

    let mut outcomes = Vec::with_capacity(config.kinds.len());
    for (kind, set_annot) in collection.iter() {
        let run = MagmaRun {
            program: config.magma.clone(),
            gene_results: gene_results.clone(),
            set_annot: set_annot.to_path_buf(),
            conditional: config.conditional,
            out: path_with_suffix(&out_prefix, kind.label()),
        };

        log::info!(
            "Running {}{} drug gene-set analysis in MAGMA",
            if config.conditional { "conditional " } else { "" },
            kind.name().to_uppercase()
        );
        run.run(kind.name())?;

        let log = run.log_path();
        let warnings = count_log_warnings(&log)?;
        outcomes.push(AnalysisOutcome {
            kind,
            gsa_out: run.gsa_out_path(),
            log,
            warnings,
        });
    }

    Ok(outcomes)
}
