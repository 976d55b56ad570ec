use approx::assert_relative_eq;
use drugsets::enrichment::{
    AssociationResult, CategoryMembership, EnrichmentConfig, EnrichmentResults,
    eligible_categories, enrich, expand_categories, join_results, test_category,
};
use drugsets::testing::correction::select_significant;
use drugsets::testing::effect::roc_auc_score;
use drugsets::testing::inference::ScoreGroupTests;
use drugsets::testing::{Alternative, CorrectionMethod, RankSumMethod};

/// D1, D3 and D5 in X, D2 in Y, D4 in Z.
fn small_example() -> (Vec<AssociationResult>, Vec<CategoryMembership>) {
    let results = vec![
        AssociationResult::new("D1", 0.01),
        AssociationResult::new("D2", 0.2),
        AssociationResult::new("D3", 0.0001),
        AssociationResult::new("D4", 0.5),
        AssociationResult::new("D5", 0.03),
    ];
    let metadata = vec![
        CategoryMembership::new("D1", ["X"]),
        CategoryMembership::new("D2", ["Y"]),
        CategoryMembership::new("D3", ["X"]),
        CategoryMembership::new("D4", ["Z"]),
        CategoryMembership::new("D5", ["X"]),
    ];
    (results, metadata)
}

/// 20 drugs with decreasing significance: the 8 strongest in HIGH,
/// the next 6 in MID and the weakest 6 in LOW.
fn separated_example() -> (Vec<AssociationResult>, Vec<CategoryMembership>) {
    let mut results = Vec::new();
    let mut metadata = Vec::new();
    for i in 0..20 {
        let id = format!("drug{:02}", i);
        let p = 10f64.powf(-((20 - i) as f64) / 4.0);
        let category = match i {
            0..8 => "HIGH",
            8..14 => "MID",
            _ => "LOW",
        };
        results.push(AssociationResult::new(id.as_str(), p));
        metadata.push(CategoryMembership::new(id.as_str(), [category]));
    }
    (results, metadata)
}

fn groups(results: &[drugsets::enrichment::CategoryResult]) -> Vec<&str> {
    results.iter().map(|r| r.group.as_str()).collect()
}

#[cfg(test)]
mod quick_test {
    use super::*;

    #[test]
    fn check_small_example_end_to_end() {
        let (results, metadata) = small_example();
        let config = EnrichmentConfig::default().with_min_sample_size(3.0);
        let enrichment = enrich(&metadata, &results, &config).unwrap();

        // Only X reaches three members
        assert_eq!(groups(&enrichment.all), vec!["X"]);
        let x = &enrichment.all[0];
        assert_relative_eq!(x.mwu, 6.0);
        assert_relative_eq!(x.auc, 1.0);
        // Groups of 3 and 2 without ties use the exact distribution by default
        assert_relative_eq!(x.p_value, 0.1, epsilon = 1e-12);

        // 0.1 does not pass 0.05 / 1
        assert!(enrichment.significant.is_empty());
        assert_relative_eq!(enrichment.threshold.unwrap(), 0.05);
    }

    #[test]
    fn check_asymptotic_method_on_small_example() {
        let (results, metadata) = small_example();
        let config = EnrichmentConfig::default()
            .with_min_sample_size(3.0)
            .with_rank_sum_method(RankSumMethod::Asymptotic);
        let enrichment = enrich(&metadata, &results, &config).unwrap();

        assert_relative_eq!(enrichment.all[0].p_value, 0.07445733658938283, epsilon = 1e-9);
    }

    #[test]
    fn check_default_uses_exact_for_small_categories() {
        assert_eq!(EnrichmentConfig::default().rank_sum_method, RankSumMethod::Auto);
        assert_eq!(RankSumMethod::default(), RankSumMethod::Auto);

        // 7 drugs ranked above 200 others: exact p is 1 / C(207, 7)
        let mut results = Vec::new();
        let mut metadata = Vec::new();
        for i in 0..207 {
            let id = format!("d{}", i);
            let p = 10f64.powf(-((207 - i) as f64) / 50.0);
            let category = if i < 7 { "TOP" } else { "REST" };
            results.push(AssociationResult::new(id.as_str(), p));
            metadata.push(CategoryMembership::new(id.as_str(), [category]));
        }
        let enrichment = enrich(&metadata, &results, &EnrichmentConfig::default()).unwrap();
        let top = enrichment.get("TOP").unwrap();
        assert_relative_eq!(top.mwu, 1400.0);
        assert!(top.p_value < 1e-12);

        let asymptotic = enrich(
            &metadata,
            &results,
            &EnrichmentConfig::default().with_rank_sum_method(RankSumMethod::Asymptotic),
        )
        .unwrap();
        assert!(asymptotic.get("TOP").unwrap().p_value > 1e-7);
    }

    #[test]
    fn check_exact_method_on_small_example() {
        let (results, metadata) = small_example();
        let config = EnrichmentConfig::default()
            .with_min_sample_size(3.0)
            .with_rank_sum_method(RankSumMethod::Exact);
        let enrichment = enrich(&metadata, &results, &config).unwrap();

        // One of the C(5, 3) = 10 orderings puts all of X on top
        assert_relative_eq!(enrichment.all[0].p_value, 0.1, epsilon = 1e-12);
        assert_relative_eq!(enrichment.all[0].mwu, 6.0);
    }

    #[test]
    fn check_metadata_only_entity_is_ignored() {
        let (results, mut metadata) = small_example();
        metadata.push(CategoryMembership::new("D6", ["X"]));
        metadata.push(CategoryMembership::new("D7", ["W"]));

        let table = join_results(&expand_categories(&metadata), &results).unwrap();
        assert!(!table.contains_entity("D6"));
        assert!(!table.contains_entity("D7"));

        let config = EnrichmentConfig::default().with_min_sample_size(3.0);
        let enrichment = enrich(&metadata, &results, &config).unwrap();
        assert_eq!(groups(&enrichment.all), vec!["X"]);
        assert_relative_eq!(enrichment.all[0].mwu, 6.0);
    }
}

#[cfg(test)]
mod eligibility_tests {
    use super::*;

    /// A with 6 members, B with 5, C with 4.
    fn sized_example() -> (Vec<AssociationResult>, Vec<CategoryMembership>) {
        let mut results = Vec::new();
        let mut metadata = Vec::new();
        let sizes = [("A", 6), ("B", 5), ("C", 4)];
        let mut i = 0;
        for (category, size) in sizes {
            for _ in 0..size {
                let id = format!("d{}", i);
                results.push(AssociationResult::new(id.as_str(), (i + 1) as f64 / 20.0));
                metadata.push(CategoryMembership::new(id.as_str(), [category]));
                i += 1;
            }
        }
        (results, metadata)
    }

    fn tested_groups(min_sample_size: f64) -> Vec<String> {
        let (results, metadata) = sized_example();
        let config = EnrichmentConfig::default().with_min_sample_size(min_sample_size);
        let enrichment = enrich(&metadata, &results, &config).unwrap();
        enrichment.all.into_iter().map(|r| r.group).collect()
    }

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(tested_groups(4.0), vec!["A", "B", "C"]);
        assert_eq!(tested_groups(5.0), vec!["A", "B"]);
        assert_eq!(tested_groups(6.0), vec!["A"]);
        assert!(tested_groups(7.0).is_empty());
    }

    #[test]
    fn test_fractional_threshold() {
        assert_eq!(tested_groups(4.5), vec!["A", "B"]);
    }

    #[test]
    fn test_eligible_categories_order_and_counts() {
        let (results, metadata) = sized_example();
        let table = join_results(&expand_categories(&metadata), &results).unwrap();
        let eligible = eligible_categories(&table, 5.0);
        assert_eq!(
            eligible,
            vec![("A".to_string(), 6), ("B".to_string(), 5)]
        );
    }

    #[test]
    fn test_nothing_eligible_gives_empty_results() {
        let (results, metadata) = sized_example();
        let config = EnrichmentConfig::default().with_min_sample_size(100.0);
        let enrichment = enrich(&metadata, &results, &config).unwrap();

        assert_eq!(enrichment.n_tested(), 0);
        assert!(enrichment.significant.is_empty());
        assert!(enrichment.adjusted_p_values.is_empty());
        assert_eq!(enrichment.threshold, None);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (results, metadata) = sized_example();
        for config in [
            EnrichmentConfig::default().with_alpha(0.0),
            EnrichmentConfig::default().with_alpha(1.5),
            EnrichmentConfig::default().with_min_sample_size(f64::NAN),
        ] {
            assert!(enrich(&metadata, &results, &config).is_err());
        }
    }
}

#[cfg(test)]
mod statistics_tests {
    use super::*;

    #[test]
    fn test_auc_invariant_under_monotonic_transform() {
        let scores = vec![2.0, 0.7, 4.0, 0.3, 1.5, 1.5, 3.1];
        let labels = vec![true, false, true, false, false, true, true];
        let transformed: Vec<f64> = scores.iter().map(|s| s * 2.0 + 1.0).collect();

        let auc = roc_auc_score(&labels, &scores).unwrap();
        let auc_transformed = roc_auc_score(&labels, &transformed).unwrap();
        assert_relative_eq!(auc, auc_transformed, epsilon = 1e-12);

        let test = scores
            .mann_whitney_test(&labels, Alternative::Greater, RankSumMethod::Asymptotic)
            .unwrap();
        let test_transformed = transformed
            .mann_whitney_test(&labels, Alternative::Greater, RankSumMethod::Asymptotic)
            .unwrap();
        assert_relative_eq!(test.statistic, test_transformed.statistic);
        assert_relative_eq!(test.p_value, test_transformed.p_value, epsilon = 1e-12);
    }

    #[test]
    fn test_auc_matches_u_over_pairs() {
        let scores = vec![2.0, 0.7, 4.0, 0.3, 1.5, 1.5, 3.1];
        let labels = vec![true, false, true, false, false, true, true];
        let test = scores
            .mann_whitney_test(&labels, Alternative::Greater, RankSumMethod::Asymptotic)
            .unwrap();
        let auc = scores.roc_auc(&labels).unwrap();
        // 4 members, 3 others
        assert_relative_eq!(auc, test.statistic / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_scores_give_p_of_one() {
        // every drug has the same p-value, so the rank variance is zero
        let mut results = Vec::new();
        let mut metadata = Vec::new();
        for i in 0..6 {
            let id = format!("d{}", i);
            results.push(AssociationResult::new(id.as_str(), 0.2));
            metadata.push(CategoryMembership::new(id.as_str(), [if i < 3 { "A" } else { "B" }]));
        }
        let config = EnrichmentConfig::default().with_min_sample_size(3.0);
        let enrichment = enrich(&metadata, &results, &config).unwrap();

        assert_eq!(groups(&enrichment.all), vec!["A", "B"]);
        for row in &enrichment.all {
            assert!(row.p_value.is_finite());
            assert_relative_eq!(row.p_value, 1.0);
            assert_relative_eq!(row.mwu, 4.5);
            assert_relative_eq!(row.auc, 0.5);
        }
        assert!(enrichment.significant.is_empty());
    }

    #[test]
    fn test_bonferroni_boundary_with_ten_tests() {
        let mut p_values = vec![0.004, 0.006];
        p_values.extend(std::iter::repeat(0.5).take(8));

        let corrected = select_significant(&p_values, CorrectionMethod::Bonferroni, 0.05).unwrap();
        assert_relative_eq!(corrected.threshold.unwrap(), 0.005, epsilon = 1e-15);
        assert!(corrected.significant[0]);
        assert!(!corrected.significant[1]);
        assert_eq!(corrected.significant.iter().filter(|s| **s).count(), 1);
    }

    #[test]
    fn test_shared_entity_counts_against_other_categories() {
        // A is in X and Y; its Y row sits in the comparison group of X
        let results = vec![
            AssociationResult::new("A", 0.001),
            AssociationResult::new("B", 0.01),
            AssociationResult::new("C", 0.5),
        ];
        let metadata = vec![
            CategoryMembership::new("A", ["X", "Y"]),
            CategoryMembership::new("B", ["X"]),
            CategoryMembership::new("C", ["Y"]),
        ];
        let table = join_results(&expand_categories(&metadata), &results).unwrap();
        assert_eq!(table.len(), 4);

        let x = test_category(&table, "X", RankSumMethod::Asymptotic).unwrap();
        assert_relative_eq!(x.mwu, 2.5);
        assert_relative_eq!(x.auc, 0.625, epsilon = 1e-12);
    }
}

#[cfg(test)]
mod correction_tests {
    use super::*;

    fn run(config: EnrichmentConfig) -> EnrichmentResults {
        let (results, metadata) = separated_example();
        enrich(&metadata, &results, &config).unwrap()
    }

    #[test]
    fn test_separated_categories_bonferroni() {
        let enrichment = run(EnrichmentConfig::default());

        // Ties in size are broken by label
        assert_eq!(groups(&enrichment.all), vec!["HIGH", "LOW", "MID"]);
        assert_eq!(groups(&enrichment.significant), vec!["HIGH"]);
        assert_relative_eq!(enrichment.threshold.unwrap(), 0.05 / 3.0, epsilon = 1e-15);

        let high = enrichment.get("HIGH").unwrap();
        assert_relative_eq!(high.mwu, 96.0);
        assert_relative_eq!(high.auc, 1.0);
        assert!(high.p_value < 1e-3);

        let low = enrichment.get("LOW").unwrap();
        assert_relative_eq!(low.mwu, 0.0);
        assert_relative_eq!(low.auc, 0.0);
        assert!(low.p_value > 0.99);

        let mid = enrichment.get("MID").unwrap();
        assert_relative_eq!(mid.mwu, 36.0);
        assert_relative_eq!(mid.auc, 36.0 / 84.0, epsilon = 1e-12);
    }

    #[test]
    fn test_separated_categories_fdr() {
        let enrichment = run(EnrichmentConfig::default().with_correction(CorrectionMethod::Fdr));

        assert_eq!(enrichment.correction, CorrectionMethod::Fdr);
        assert_eq!(enrichment.threshold, None);
        assert_eq!(enrichment.adjusted_p_values.len(), 3);
        assert_eq!(groups(&enrichment.significant), vec!["HIGH"]);

        // Step-up adjustment never lowers a p-value
        for (row, adjusted) in enrichment.all.iter().zip(&enrichment.adjusted_p_values) {
            assert!(*adjusted >= row.p_value);
            assert!(*adjusted <= 1.0);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sequential = run(EnrichmentConfig::default().with_min_sample_size(2.0));
        let parallel = run(
            EnrichmentConfig::default()
                .with_min_sample_size(2.0)
                .with_parallel(true),
        );
        assert_eq!(sequential, parallel);
    }
}
