// src/models/tree.rs
// CART classifier with Gini impurity, grown until leaves are pure or no
// threshold separates the remaining samples. A split that leaves impurity
// unchanged is still taken, so XOR-like targets resolve one level down.

use crate::error::{FairnessError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        class: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
    importances: Vec<f64>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    improvement: f64,
}

fn class_counts(y: &[u8], idx: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in idx {
        counts[usize::from(y[i] == 1)] += 1;
    }
    counts
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

/// Majority class; ties go to class 0.
fn majority(counts: [usize; 2]) -> u8 {
    u8::from(counts[1] > counts[0])
}

impl DecisionTree {
    pub fn fit(x: &[Vec<f64>], y: &[u8]) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(FairnessError::Model(format!(
                "decision tree needs matching, non-empty inputs ({} rows, {} labels)",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if x.iter().any(|row| row.len() != n_features) {
            return Err(FairnessError::Model("ragged feature matrix".to_string()));
        }

        let mut importances = vec![0.0; n_features];
        let idx: Vec<usize> = (0..x.len()).collect();
        let root = Self::grow(x, y, &idx, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        Ok(Self { root, importances })
    }

    fn grow(x: &[Vec<f64>], y: &[u8], idx: &[usize], importances: &mut [f64]) -> Node {
        let counts = class_counts(y, idx);
        if counts[0] == 0 || counts[1] == 0 {
            return Node::Leaf { class: majority(counts) };
        }

        let Some(best) = Self::best_split(x, y, idx, gini(counts)) else {
            return Node::Leaf { class: majority(counts) };
        };

        importances[best.feature] += best.improvement;
        let (left, right): (Vec<usize>, Vec<usize>) =
            idx.iter().partition(|&&i| x[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(Self::grow(x, y, &left, importances)),
            right: Box::new(Self::grow(x, y, &right, importances)),
        }
    }

    /// Weighted impurity decrease `n * g(parent) - n_l * g(left) - n_r * g(right)`;
    /// the first candidate wins ties and is kept even at zero decrease.
    fn best_split(x: &[Vec<f64>], y: &[u8], idx: &[usize], parent_gini: f64) -> Option<Candidate> {
        let n = idx.len() as f64;
        let mut best: Option<Candidate> = None;

        for feature in 0..x[idx[0]].len() {
            let mut sorted = idx.to_vec();
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let total = class_counts(y, &sorted);
            let mut left = [0usize; 2];
            for pos in 0..sorted.len() - 1 {
                left[usize::from(y[sorted[pos]] == 1)] += 1;
                let here = x[sorted[pos]][feature];
                let next = x[sorted[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let right = [total[0] - left[0], total[1] - left[1]];
                let n_left = (pos + 1) as f64;
                let n_right = n - n_left;
                let improvement = n * parent_gini - n_left * gini(left) - n_right * gini(right);

                if best.as_ref().map_or(true, |b| improvement > b.improvement + 1e-12) {
                    best = Some(Candidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        improvement,
                    });
                }
            }
        }
        best
    }

    pub fn predict_one(&self, row: &[f64]) -> u8 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<u8> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }

    /// Normalized total impurity decrease per feature; all zeros for a single leaf.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_feature_threshold_is_midpoint() {
        let x = vec![vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0], vec![4.0, 0.0]];
        let y = vec![1, 1, 0, 0];
        let tree = DecisionTree::fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(&x), y);
        assert_eq!(tree.predict_one(&[2.5, 0.0]), 1);
        assert_eq!(tree.predict_one(&[2.51, 0.0]), 0);
        assert_eq!(tree.feature_importances(), &[1.0, 0.0]);
    }

    #[test]
    fn zero_gain_root_split_is_taken_for_xor() {
        let x = vec![vec![0.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0]];
        let y = vec![0, 1, 1, 0];
        let tree = DecisionTree::fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.predict(&x), y);
        // The root split on feature 0 gains nothing; both children split on feature 1.
        assert_eq!(tree.feature_importances(), &[0.0, 1.0]);
    }

    #[test]
    fn importances_split_across_features() {
        // Feature 0 separates most of the data, feature 1 cleans up the rest.
        let x = vec![
            vec![1.0, 1.0],
            vec![1.0, 2.0],
            vec![2.0, 1.0],
            vec![3.0, 1.0],
            vec![3.0, 2.0],
            vec![3.0, 5.0],
        ];
        let y = vec![1, 1, 1, 0, 0, 1];
        let tree = DecisionTree::fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x), y);
        let imp = tree.feature_importances();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(imp[0] > 0.0 && imp[1] > 0.0);
    }

    #[test]
    fn pure_target_gives_single_leaf_and_zero_importance() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        let tree = DecisionTree::fit(&x, &[1, 1, 1]).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.feature_importances(), &[0.0]);
        assert_eq!(tree.predict_one(&[10.0]), 1);
    }

    #[test]
    fn identical_rows_with_conflicting_labels_stop_growing() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0]];
        let tree = DecisionTree::fit(&x, &[0, 1, 1]).unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict_one(&[1.0]), 1);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(DecisionTree::fit(&[], &[]).is_err());
        assert!(DecisionTree::fit(&[vec![1.0]], &[0, 1]).is_err());
        assert!(DecisionTree::fit(&[vec![1.0], vec![1.0, 2.0]], &[0, 1]).is_err());
    }
}
