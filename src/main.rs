//! DRUGSETS command line
//!
//! `drugsets run` performs the MAGMA drug gene-set analyses and, when asked,
//! tests drug categories for enrichment among the individual drug results.
//! `drugsets enrich` runs only the enrichment step on an existing `.gsa.out`.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use drugsets::enrichment::{
    CategoryKind, DEFAULT_ALPHA, DEFAULT_MIN_SAMPLE_SIZE, EnrichmentConfig, EnrichmentResults,
};
use drugsets::io::{
    DEFAULT_METADATA_FILE, DEFAULT_METADATA_ID_COLUMN, EnrichmentOutputs, MetadataColumns,
    enrich_files,
};
use drugsets::magma::{
    DEFAULT_SET_SIZE, GeneIdScheme, GeneSetKind, PipelineConfig, locate_gsa_results,
    resolve_out_prefix, run_gene_set_analyses,
};
use drugsets::testing::{CorrectionMethod, RankSumMethod};

#[derive(Parser, Debug)]
#[command(
    name = "drugsets",
    version,
    about = "Drug gene-set analysis with MAGMA and drug category enrichment"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run drug gene-set analyses in MAGMA, optionally followed by category enrichment
    Run(RunArgs),
    /// Test drug categories for enrichment in existing individual drug results
    Enrich(EnrichArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Gene associations from MAGMA (.genes.raw)
    #[arg(short = 'g', long)]
    geneassoc: PathBuf,

    /// Type of drug gene set to analyse
    #[arg(short = 'd', long, value_enum)]
    drugsets: DrugSetsArg,

    /// Output prefix
    #[arg(short = 'o', long)]
    out: PathBuf,

    /// Condition the competitive analysis on the gene set of all druggable genes
    #[arg(short = 'c', long, value_enum, default_value_t = YesNo::Yes)]
    conditional: YesNo,

    /// Minimum drug gene-set size (at least 2)
    #[arg(short = 's', long, default_value_t = DEFAULT_SET_SIZE)]
    setsize: usize,

    /// Gene naming convention of the .genes.raw file (use ensembl92 for FUMA output)
    #[arg(short = 'i', long, value_enum, default_value_t = IdArg::Entrez)]
    id: IdArg,

    /// Drug category to test for enrichment (needs the solo analysis)
    #[arg(short = 'e', long, value_enum)]
    enrich: Option<EnrichArg>,

    /// MAGMA executable
    #[arg(long, default_value = "magma")]
    magma: PathBuf,

    #[command(flatten)]
    options: EnrichOptions,
}

#[derive(Args, Debug)]
struct EnrichArgs {
    /// Individual drug gene-set results (.gsa.out)
    #[arg(long)]
    gsa: PathBuf,

    /// Output prefix
    #[arg(short = 'o', long)]
    out: PathBuf,

    /// Drug category to test
    #[arg(short = 'e', long, value_enum)]
    enrich: EnrichArg,

    #[command(flatten)]
    options: EnrichOptions,
}

#[derive(Args, Debug)]
struct EnrichOptions {
    /// Minimum number of drugs for a category to be tested
    #[arg(short = 'n', long, default_value_t = DEFAULT_MIN_SAMPLE_SIZE)]
    nsize: f64,

    /// Multiple testing correction for category enrichment
    #[arg(short = 'p', long, value_enum, default_value_t = CorrectArg::Bonf)]
    correct: CorrectArg,

    /// Significance level of the corrected tests
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    alpha: f64,

    /// How rank-sum p-values are computed
    #[arg(long, value_enum, default_value_t = RankSumArg::Auto)]
    rank_sum_method: RankSumArg,

    /// Drug metadata table (tab-separated); defaults to the one in the data directory
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Drug identifier column of the metadata table
    #[arg(long, default_value = DEFAULT_METADATA_ID_COLUMN)]
    metadata_id_column: String,

    /// Separator between labels of a multi-valued metadata cell
    #[arg(long, default_value_t = ';')]
    label_separator: char,

    /// Directory holding GENESETS/ and the drug metadata
    #[arg(long, env = "DRUGSETS_DATA", default_value = "DATA")]
    data_dir: PathBuf,

    /// Number of threads for the category tests
    #[arg(long, default_value_t = 1)]
    threads: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum DrugSetsArg {
    Solo,
    Atc,
    Moa,
    Ind,
    All,
}

impl DrugSetsArg {
    fn kinds(self) -> Vec<GeneSetKind> {
        match self {
            DrugSetsArg::Solo => vec![GeneSetKind::Solo],
            DrugSetsArg::Atc => vec![GeneSetKind::Atc],
            DrugSetsArg::Moa => vec![GeneSetKind::Moa],
            DrugSetsArg::Ind => vec![GeneSetKind::Ind],
            DrugSetsArg::All => GeneSetKind::ALL.to_vec(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EnrichArg {
    Atc,
    Moa,
    Ind,
    All,
}

impl EnrichArg {
    fn kinds(self) -> Vec<CategoryKind> {
        match self {
            EnrichArg::Atc => vec![CategoryKind::Atc],
            EnrichArg::Moa => vec![CategoryKind::Moa],
            EnrichArg::Ind => vec![CategoryKind::Ind],
            EnrichArg::All => CategoryKind::ALL.to_vec(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum IdArg {
    Entrez,
    Ensembl,
    #[value(name = "ensembl92")]
    Ensembl92,
}

impl From<IdArg> for GeneIdScheme {
    fn from(arg: IdArg) -> Self {
        match arg {
            IdArg::Entrez => GeneIdScheme::Entrez,
            IdArg::Ensembl => GeneIdScheme::Ensembl,
            IdArg::Ensembl92 => GeneIdScheme::Ensembl92,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum YesNo {
    Yes,
    No,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CorrectArg {
    Bonf,
    Fdr,
}

impl From<CorrectArg> for CorrectionMethod {
    fn from(arg: CorrectArg) -> Self {
        match arg {
            CorrectArg::Bonf => CorrectionMethod::Bonferroni,
            CorrectArg::Fdr => CorrectionMethod::Fdr,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RankSumArg {
    Asymptotic,
    Exact,
    Auto,
}

impl From<RankSumArg> for RankSumMethod {
    fn from(arg: RankSumArg) -> Self {
        match arg {
            RankSumArg::Asymptotic => RankSumMethod::Asymptotic,
            RankSumArg::Exact => RankSumMethod::Exact,
            RankSumArg::Auto => RankSumMethod::Auto,
        }
    }
}

impl EnrichOptions {
    fn config(&self) -> EnrichmentConfig {
        EnrichmentConfig::default()
            .with_min_sample_size(self.nsize)
            .with_correction(self.correct.into())
            .with_alpha(self.alpha)
            .with_rank_sum_method(self.rank_sum_method.into())
            .with_parallel(self.threads > 1)
    }

    fn metadata_path(&self) -> PathBuf {
        self.metadata
            .clone()
            .unwrap_or_else(|| self.data_dir.join(DEFAULT_METADATA_FILE))
    }

    fn columns(&self, kind: CategoryKind) -> MetadataColumns {
        MetadataColumns::for_kind(kind)
            .with_id_column(self.metadata_id_column.as_str())
            .with_separator(self.label_separator)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    println!(
        "\n| ----- Welcome to DRUGSETS v{} ----- |\n",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Enrich(args) => enrich(args),
    }
}

fn init_thread_pool(threads: usize) -> anyhow::Result<()> {
    if threads > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build the rayon thread pool")?;
        log::info!("Using {} threads", threads);
    }
    Ok(())
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    println!("Input arguments used:\n");
    println!("\tgeneassoc = {}", args.geneassoc.display());
    println!("\tdrugsets = {:?}", args.drugsets);
    println!("\tout = {}", args.out.display());
    println!("\tconditional = {:?}", args.conditional);
    println!("\tsetsize = {}", args.setsize);
    println!("\tid = {:?}", args.id);
    println!("\tenrich = {:?}", args.enrich);
    println!("\tnsize = {}", args.options.nsize);
    println!("\tcorrect = {:?}\n", args.options.correct);

    init_thread_pool(args.options.threads)?;

    let pipeline = PipelineConfig {
        magma: args.magma.clone(),
        gene_results: args.geneassoc.clone(),
        out_prefix: args.out.clone(),
        data_dir: args.options.data_dir.clone(),
        kinds: args.drugsets.kinds(),
        id_scheme: args.id.into(),
        conditional: args.conditional == YesNo::Yes,
        set_size: args.setsize,
    };

    let outcomes = run_gene_set_analyses(&pipeline).context("Drug gene-set analysis failed")?;
    for outcome in &outcomes {
        println!(
            "\t{}: {} warnings found (see {} for details)",
            outcome.kind.name().to_uppercase(),
            outcome.warnings,
            outcome.log.display()
        );
        println!("\tResults for all drug gene sets saved to {}", outcome.gsa_out.display());
    }
    println!("\nDrug gene-set analysis finished.\n");

    let Some(enrich_arg) = args.enrich else {
        return Ok(());
    };
    if !matches!(args.drugsets, DrugSetsArg::Solo | DrugSetsArg::All) {
        log::warn!("To test for enrichment --drugsets must be 'solo' or 'all'; skipping");
        return Ok(());
    }

    let out_prefix = resolve_out_prefix(&args.out)?;
    let gsa = locate_gsa_results(&out_prefix)?;
    run_enrichment(&gsa, &out_prefix, enrich_arg, &args.options)
}

fn enrich(args: EnrichArgs) -> anyhow::Result<()> {
    init_thread_pool(args.options.threads)?;
    let out_prefix = resolve_out_prefix(&args.out)?;
    run_enrichment(&args.gsa, &out_prefix, args.enrich, &args.options)
}

fn run_enrichment(
    gsa: &Path,
    out_prefix: &Path,
    enrich_arg: EnrichArg,
    options: &EnrichOptions,
) -> anyhow::Result<()> {
    let config = options.config();
    let metadata = options.metadata_path();
    if !metadata.is_file() {
        bail!("Drug metadata table not found: {}", metadata.display());
    }

    for kind in enrich_arg.kinds() {
        println!("Running {} enrichment analysis...", kind.short_name().to_uppercase());
        let (results, outputs) = enrich_files(
            gsa,
            &metadata,
            &options.columns(kind),
            out_prefix,
            kind.short_name(),
            &config,
        )
        .with_context(|| format!("{} enrichment failed", kind))?;
        report(&results, &outputs);
    }

    println!("\nEnrichment analysis finished.\n");
    Ok(())
}

fn report(results: &EnrichmentResults, outputs: &EnrichmentOutputs) {
    println!(
        "\t{} categories tested, {} significant ({})",
        results.n_tested(),
        results.significant.len(),
        results.correction.tag()
    );
    println!("\tSaving all results to {}", outputs.all.display());
    if let Some(path) = &outputs.significant {
        println!("\tSaving significant results to {}", path.display());
    }
}
