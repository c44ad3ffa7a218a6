//! Classification results artifact

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::taxonomy::Category;

/// One complaint assigned to one curated category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub complaint_id: String,
    pub assigned_category: String,
}

/// A complaint the classifier gave up on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub complaint_id: String,
    pub reason: String,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: usize,
    /// Share of successfully assigned complaints, rounded to two decimals
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub total_complaints: usize,
    pub assigned: usize,
    pub failed: usize,
    pub category_distribution: Vec<CategoryShare>,
}

impl ClassificationSummary {
    /// Aggregate counts per category.
    ///
    /// Percentages are computed over assigned items only. The distribution
    /// is ordered by count, largest first, then by category name.
    pub fn from_results(
        total_complaints: usize,
        results: &[ClassificationResult],
        failed: &[FailedItem],
    ) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for result in results {
            *counts.entry(result.assigned_category.as_str()).or_insert(0) += 1;
        }

        let assigned = results.len();
        let mut category_distribution: Vec<CategoryShare> = counts
            .into_iter()
            .map(|(category, count)| CategoryShare {
                category: category.to_string(),
                count,
                percentage: round2(count as f64 * 100.0 / assigned as f64),
            })
            .collect();
        category_distribution
            .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

        Self {
            total_complaints,
            assigned,
            failed: failed.len(),
            category_distribution,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classification results artifact, written by phase 4
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationArtifact {
    pub taxonomy_used: Vec<Category>,
    pub classification_results: Vec<ClassificationResult>,
    #[serde(default)]
    pub failed_items: Vec<FailedItem>,
    pub summary: ClassificationSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, category: &str) -> ClassificationResult {
        ClassificationResult {
            complaint_id: id.to_string(),
            assigned_category: category.to_string(),
        }
    }

    #[test]
    fn distribution_ignores_failed_items() {
        let results = vec![result("1", "A"), result("2", "B"), result("3", "A")];
        let failed = vec![FailedItem {
            complaint_id: "4".into(),
            reason: "unknown category 'C'".into(),
            attempts: 1,
        }];

        let summary = ClassificationSummary::from_results(4, &results, &failed);

        assert_eq!(summary.total_complaints, 4);
        assert_eq!(summary.assigned, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.category_distribution.len(), 2);
        assert_eq!(summary.category_distribution[0].category, "A");
        assert_eq!(summary.category_distribution[0].count, 2);
        assert_eq!(summary.category_distribution[0].percentage, 66.67);
        assert_eq!(summary.category_distribution[1].percentage, 33.33);
    }

    #[test]
    fn ties_are_ordered_by_name() {
        let results = vec![result("1", "Zeta"), result("2", "Alpha")];
        let summary = ClassificationSummary::from_results(2, &results, &[]);
        let names: Vec<_> = summary
            .category_distribution
            .iter()
            .map(|s| s.category.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn empty_results_give_empty_distribution() {
        let summary = ClassificationSummary::from_results(0, &[], &[]);
        assert!(summary.category_distribution.is_empty());
        assert_eq!(summary.assigned, 0);
    }
}
