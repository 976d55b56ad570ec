//! Error types of the enrichment core and table I/O.
use std::fmt;
use thiserror::Error;

/// The two inputs of an enrichment run, named in validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTable {
    AssociationResults,
    CategoryMembership,
}

impl fmt::Display for InputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputTable::AssociationResults => write!(f, "association results"),
            InputTable::CategoryMembership => write!(f, "category membership"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("{table} table is missing required column '{column}'")]
    MissingColumn { table: InputTable, column: String },
    #[error("{table} table, line {line}: {reason}")]
    MalformedRow {
        table: InputTable,
        line: usize,
        reason: String,
    },
    #[error("invalid p-value {p_value} for '{entity}': must be in (0, 1]")]
    InvalidPValue { entity: String, p_value: f64 },
    #[error("invalid enrichment configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Statistics(#[from] anyhow::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, EnrichmentError>;

/// Failures of the MAGMA gene-set analysis step.
#[derive(Error, Debug)]
pub enum MagmaError {
    #[error("gene association file {0:?} does not end in '.genes.raw'")]
    GeneResultsFile(std::path::PathBuf),
    #[error("gene-set file not found: {0:?}")]
    GeneSetFileMissing(std::path::PathBuf),
    #[error("minimum gene-set size must be at least {min}, got {size}")]
    InvalidSetSize { size: usize, min: usize },
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' failed for {label} analysis ({status})")]
    Failed {
        program: String,
        label: String,
        status: std::process::ExitStatus,
    },
    #[error("individual drug results not found at {0:?} (.gsa.out or .gsa.out.txt)")]
    MissingSoloResults(std::path::PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
