//! Reading MAGMA gene-set results and drug metadata, writing enrichment tables.
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::enrichment::{
    AssociationResult, CategoryKind, CategoryMembership, CategoryResult, EnrichmentConfig,
    EnrichmentResults, enrich,
};
use crate::error::{EnrichmentError, InputTable, Result};

/// Set name column of a MAGMA `.gsa.out` table.
pub const VARIABLE_COLUMN: &str = "VARIABLE";
/// Untruncated set name, present when some names exceed MAGMA's column width.
pub const FULL_NAME_COLUMN: &str = "FULL_NAME";
pub const P_COLUMN: &str = "P";

/// Drug metadata table shipped in the data directory.
pub const DEFAULT_METADATA_FILE: &str = "drug_metadata.tsv";
pub const DEFAULT_METADATA_ID_COLUMN: &str = "DRUG";
pub const DEFAULT_LABEL_SEPARATOR: char = ';';

const MISSING_VALUES: [&str; 7] = ["", "NA", "nan", "NaN", "None", "null", "[]"];

const RESULT_COLUMNS: [&str; 4] = ["GROUP", "MWU", "P", "AUC"];
const RESULT_COLUMN_NOTES: [&str; 4] = [
    "# GROUP = drug category",
    "# MWU = Mann-Whitney U statistic of the drugs in the category against all other drugs",
    "# P = one-sided p-value that drugs in the category are more significant than the rest",
    "# AUC = area under the ROC curve of drug significance predicting category membership",
];

fn is_missing(value: &str) -> bool {
    MISSING_VALUES.contains(&value.trim())
}

/// `path` with `suffix` appended to its final component.
pub(crate) fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut joined: OsString = path.as_os_str().to_owned();
    joined.push(suffix);
    PathBuf::from(joined)
}

struct GsaHeader {
    columns: Vec<String>,
    id_idx: usize,
    p_idx: usize,
}

impl GsaHeader {
    fn parse(fields: &[&str]) -> Result<Self> {
        let columns: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let position = |name: &str| {
            columns
                .iter()
                .position(|c| c == name)
                .ok_or(EnrichmentError::MissingColumn {
                    table: InputTable::AssociationResults,
                    column: name.to_string(),
                })
        };
        let variable_idx = position(VARIABLE_COLUMN)?;
        let p_idx = position(P_COLUMN)?;
        let id_idx = position(FULL_NAME_COLUMN).unwrap_or(variable_idx);

        Ok(GsaHeader {
            columns,
            id_idx,
            p_idx,
        })
    }

    fn parse_row(&self, fields: &[&str], line: usize) -> Result<AssociationResult> {
        let table = InputTable::AssociationResults;
        if fields.len() < self.columns.len() {
            return Err(EnrichmentError::MalformedRow {
                table,
                line,
                reason: format!(
                    "expected {} fields, found {}",
                    self.columns.len(),
                    fields.len()
                ),
            });
        }

        let p_field = fields[self.p_idx];
        let p_value = if is_missing(p_field) {
            None
        } else {
            let p = p_field
                .parse::<f64>()
                .map_err(|_| EnrichmentError::MalformedRow {
                    table,
                    line,
                    reason: format!("cannot read p-value '{}'", p_field),
                })?;
            Some(p)
        };

        let statistics = self
            .columns
            .iter()
            .zip(fields)
            .enumerate()
            .filter(|&(i, _)| i != self.id_idx && i != self.p_idx)
            .filter_map(|(_, (name, value))| value.parse::<f64>().ok().map(|v| (name.clone(), v)))
            .collect();

        Ok(AssociationResult {
            entity_id: fields[self.id_idx].to_string(),
            p_value,
            statistics,
        })
    }
}

/// Parse a whitespace-delimited MAGMA gene-set results table.
///
/// Lines starting with `#` are skipped and the first remaining line is the
/// header. `VARIABLE` and `P` are required; `FULL_NAME`, when present, replaces
/// `VARIABLE` as the entity identifier. A `NA` p-value is kept as missing.
pub fn parse_association_results<R: BufRead>(reader: R) -> Result<Vec<AssociationResult>> {
    let mut header: Option<GsaHeader> = None;
    let mut results = Vec::new();

    for (line_idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();

        match &header {
            None => header = Some(GsaHeader::parse(&fields)?),
            Some(h) => results.push(h.parse_row(&fields, line_idx + 1)?),
        }
    }

    if header.is_none() {
        return Err(EnrichmentError::MissingColumn {
            table: InputTable::AssociationResults,
            column: VARIABLE_COLUMN.to_string(),
        });
    }

    Ok(results)
}

/// Load a MAGMA `.gsa.out` file.
pub fn read_association_results(path: &Path) -> Result<Vec<AssociationResult>> {
    log::info!("Loading gene-set results: {:?}", path);
    let file = File::open(path)?;
    let results = parse_association_results(BufReader::new(file))?;
    log::info!("Loaded {} gene-set results", results.len());
    Ok(results)
}

/// Columns of the drug metadata table used for one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataColumns {
    pub id_column: String,
    pub category_column: String,
    /// Separator between labels of the multi-valued category field
    pub separator: char,
}

impl MetadataColumns {
    pub fn new(category_column: impl Into<String>) -> Self {
        MetadataColumns {
            id_column: DEFAULT_METADATA_ID_COLUMN.to_string(),
            category_column: category_column.into(),
            separator: DEFAULT_LABEL_SEPARATOR,
        }
    }

    pub fn for_kind(kind: CategoryKind) -> Self {
        Self::new(kind.metadata_column())
    }

    pub fn with_id_column(mut self, id_column: impl Into<String>) -> Self {
        self.id_column = id_column.into();
        self
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }
}

/// Split a multi-valued metadata cell into labels.
///
/// Accepts plain separated values (`N05A;N06A`) and list literals
/// (`['N05A', 'N06A']`, with commas). Commas inside quoted list items are kept.
/// Missing markers give `None`.
pub fn parse_labels(cell: &str, separator: char) -> Option<Vec<String>> {
    let cell = cell.trim();
    if is_missing(cell) {
        return None;
    }

    let items = match cell.strip_prefix('[').and_then(|c| c.strip_suffix(']')) {
        Some(inner) => split_list_literal(inner),
        None => cell
            .split(separator)
            .map(|label| label.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
            .collect(),
    };

    let labels: Vec<String> = items
        .into_iter()
        .map(|label| label.trim().to_string())
        .filter(|label| !is_missing(label))
        .collect();

    if labels.is_empty() { None } else { Some(labels) }
}

/// Items of a list literal body, split on commas outside `'` or `"` quotes.
/// Quotes are removed and a backslash escapes the next character.
fn split_list_literal(body: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (Some(open), c) if c == open => quote = None,
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => quote = Some(c),
            (None, ',') => items.push(std::mem::take(&mut current)),
            (None, c) => current.push(c),
        }
    }
    items.push(current);
    items
}

/// Parse a tab-separated drug metadata table.
///
/// Rows without an entity identifier are skipped.
pub fn parse_category_membership<R: Read>(
    reader: R,
    columns: &MetadataColumns,
) -> Result<Vec<CategoryMembership>> {
    let table = InputTable::CategoryMembership;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or(EnrichmentError::MissingColumn {
                table,
                column: name.to_string(),
            })
    };
    let id_idx = position(columns.id_column.as_str())?;
    let category_idx = position(columns.category_column.as_str())?;

    let mut memberships = Vec::new();
    let mut skipped = 0usize;
    for record in rdr.records() {
        let record = record?;
        let entity_id = record.get(id_idx).map(str::trim).unwrap_or("");
        if is_missing(entity_id) {
            skipped += 1;
            continue;
        }

        let categories = record
            .get(category_idx)
            .and_then(|cell| parse_labels(cell, columns.separator));
        memberships.push(CategoryMembership {
            entity_id: entity_id.to_string(),
            categories,
        });
    }

    if skipped > 0 {
        log::debug!("skipped {} metadata rows without '{}'", skipped, columns.id_column);
    }
    Ok(memberships)
}

/// Load the drug metadata table, keeping the identifier and one category column.
pub fn read_category_membership(
    path: &Path,
    columns: &MetadataColumns,
) -> Result<Vec<CategoryMembership>> {
    log::info!(
        "Loading drug metadata {:?} (column '{}')",
        path,
        columns.category_column
    );
    let file = File::open(path)?;
    let memberships = parse_category_membership(file, columns)?;
    log::info!("Loaded metadata for {} drugs", memberships.len());
    Ok(memberships)
}

/// Write result rows as a tab-separated table preceded by column notes.
///
/// An empty table still gets its notes and header line.
pub fn write_category_results<W: Write>(mut writer: W, rows: &[CategoryResult]) -> Result<()> {
    for note in RESULT_COLUMN_NOTES {
        writeln!(writer, "{}", note)?;
    }

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(!rows.is_empty())
        .from_writer(writer);

    if rows.is_empty() {
        csv_writer.write_record(RESULT_COLUMNS)?;
    }
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_category_results_file(path: &Path, rows: &[CategoryResult]) -> Result<()> {
    let file = File::create(path)?;
    write_category_results(BufWriter::new(file), rows)
}

/// Output file of an enrichment run: `<prefix>_enrich[.<tag>].<kind>.txt`.
pub fn enrichment_output_path(prefix: &Path, kind: &str, tag: Option<&str>) -> PathBuf {
    let suffix = match tag {
        Some(tag) => format!("_enrich.{}.{}.txt", tag, kind),
        None => format!("_enrich.{}.txt", kind),
    };
    path_with_suffix(prefix, &suffix)
}

/// Files written by [`persist_enrichment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOutputs {
    pub all: PathBuf,
    /// `None` when no category passed the correction and nothing was written
    pub significant: Option<PathBuf>,
}

/// Write the full result table, and the significant table when it has rows.
pub fn persist_enrichment(
    prefix: &Path,
    kind: &str,
    results: &EnrichmentResults,
) -> Result<EnrichmentOutputs> {
    let all = enrichment_output_path(prefix, kind, None);
    write_category_results_file(&all, &results.all)?;

    let significant = if results.significant.is_empty() {
        None
    } else {
        let path = enrichment_output_path(prefix, kind, Some(results.correction.tag()));
        write_category_results_file(&path, &results.significant)?;
        Some(path)
    };

    Ok(EnrichmentOutputs { all, significant })
}

/// Enrich one category column of the metadata table against a `.gsa.out` file
/// and write `<out_prefix>_enrich[.<tag>].<kind>.txt`.
pub fn enrich_files(
    gsa_path: &Path,
    metadata_path: &Path,
    columns: &MetadataColumns,
    out_prefix: &Path,
    kind: &str,
    config: &EnrichmentConfig,
) -> Result<(EnrichmentResults, EnrichmentOutputs)> {
    config.validate()?;
    let results = read_association_results(gsa_path)?;
    let memberships = read_category_membership(metadata_path, columns)?;

    let enrichment = enrich(&memberships, &results, config)?;
    let outputs = persist_enrichment(out_prefix, kind, &enrichment)?;
    log::info!("Saved all {} results to {:?}", kind, outputs.all);
    if let Some(path) = &outputs.significant {
        log::info!("Saved significant {} results to {:?}", kind, path);
    }
    Ok((enrichment, outputs))
}
