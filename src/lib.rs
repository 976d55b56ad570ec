//! # drugsets
//!
//! Drug gene-set analysis of GWAS gene associations and enrichment testing of drug categories.
//!
//! Gene-level association results from MAGMA are tested against gene sets built from drug
//! targets. The per-drug results can then be grouped by ATC class, mechanism of action or
//! clinical indication to ask whether the drugs of a category rank above all other drugs.
//!
//! ## Core Features
//!
//! - **Gene-Set Analysis**: MAGMA runs over the bundled individual drug and drug category sets,
//!   with optional conditioning on all druggable genes and a minimum gene-set size
//! - **Category Enrichment**: one-sided Mann-Whitney U test and ROC AUC per drug category
//! - **Multiple Testing Correction**: Bonferroni and Benjamini-Hochberg FDR
//!
//! ## Quick Start
//!
//! Build [`enrichment::AssociationResult`] and [`enrichment::CategoryMembership`] rows, or
//! read them with [`io::read_association_results`] and [`io::read_category_membership`],
//! then call [`enrichment::enrich`] with an [`enrichment::EnrichmentConfig`].
//!
//! ## Module Organization
//!
//! - **[`enrichment`]**: Category expansion, result join and the enrichment engine
//! - **[`testing`]**: Rank-sum test, ROC AUC and multiple testing correction
//! - **[`io`]**: MAGMA `.gsa.out` and drug metadata readers, result table writers
//! - **[`magma`]**: Gene-set file selection and MAGMA invocation

pub mod enrichment;
pub mod error;
pub mod io;
pub mod magma;
pub mod testing;
