use super::question::Difficulty;

/// 按目标题数预先算好的难度序列
///
/// basic 32%，intermediate 40%，其余为 advanced。按下标循环取用，
/// 和想法、题号的下标互不影响。
#[derive(Debug, Clone)]
pub struct DifficultyDistribution {
    labels: Vec<Difficulty>,
}

impl DifficultyDistribution {
    pub fn new(target: usize) -> Self {
        let basic = target * 32 / 100;
        let intermediate = target * 40 / 100;
        let advanced = target - basic - intermediate;

        let mut labels = Vec::with_capacity(target);
        labels.extend(std::iter::repeat(Difficulty::Basic).take(basic));
        labels.extend(std::iter::repeat(Difficulty::Intermediate).take(intermediate));
        labels.extend(std::iter::repeat(Difficulty::Advanced).take(advanced));
        Self { labels }
    }

    /// 第 `index` 次取用的难度
    pub fn get(&self, index: usize) -> Difficulty {
        if self.labels.is_empty() {
            return Difficulty::default();
        }
        self.labels[index % self.labels.len()]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (basic, intermediate, advanced)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.labels
            .iter()
            .fold((0, 0, 0), |(b, i, a), label| match label {
                Difficulty::Basic => (b + 1, i, a),
                Difficulty::Intermediate => (b, i + 1, a),
                Difficulty::Advanced => (b, i, a + 1),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_for_25() {
        let dist = DifficultyDistribution::new(25);
        assert_eq!(dist.counts(), (8, 10, 7));
        assert_eq!(dist.len(), 25);
    }

    #[test]
    fn test_distribution_small_targets() {
        // 1 道题: 0 basic, 0 intermediate, 1 advanced
        assert_eq!(DifficultyDistribution::new(1).counts(), (0, 0, 1));
        assert_eq!(DifficultyDistribution::new(10).counts(), (3, 4, 3));
        assert_eq!(DifficultyDistribution::new(30).counts(), (9, 12, 9));
    }

    #[test]
    fn test_get_cycles_in_order() {
        let dist = DifficultyDistribution::new(25);
        assert_eq!(dist.get(0), Difficulty::Basic);
        assert_eq!(dist.get(8), Difficulty::Intermediate);
        assert_eq!(dist.get(18), Difficulty::Advanced);
        assert_eq!(dist.get(25), Difficulty::Basic);
    }

    #[test]
    fn test_empty_distribution_has_default() {
        let dist = DifficultyDistribution::new(0);
        assert!(dist.is_empty());
        assert_eq!(dist.get(3), Difficulty::Intermediate);
    }
}
