pub struct StatsHelper;

impl StatsHelper {
    pub fn mean<I>(values: I) -> f32
    where
        I: IntoIterator<Item = f32>,
    {
        let (sum, count) = values
            .into_iter()
            .fold((0.0f32, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            return 0.0;
        }
        sum / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(StatsHelper::mean(Vec::<f32>::new()), 0.0);
    }

    #[test]
    fn mean_averages_values() {
        assert_eq!(StatsHelper::mean([2.0, 4.0, 9.0]), 5.0);
    }
}
