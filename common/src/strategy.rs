//! 戦略コンビネータ
//!
//! 候補を優先順に1つずつ試し、最初に値を返したものを採用する。
//! 修復カスケード（同期）と取得マトリクス（非同期）で共用する。

use std::future::Future;

/// 最初に成功した候補とその値を返す
///
/// 候補は順番に1つずつ評価し、成功した時点で以降の候補は評価しない。
pub fn first_success<C, T, F>(candidates: impl IntoIterator<Item = C>, mut attempt: F) -> Option<(C, T)>
where
    F: FnMut(&C) -> Option<T>,
{
    for candidate in candidates {
        if let Some(value) = attempt(&candidate) {
            return Some((candidate, value));
        }
    }
    None
}

/// `first_success` の非同期版
///
/// 各候補の future を完了まで待ってから次の候補に進む（並列実行しない）。
pub async fn first_success_async<C, T, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Option<(C, T)>
where
    C: Clone,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for candidate in candidates {
        if let Some(value) = attempt(candidate.clone()).await {
            return Some((candidate, value));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_first_success_stops_at_first_hit() {
        let mut tried = Vec::new();
        let result = first_success([1, 2, 3, 4], |n| {
            tried.push(*n);
            (*n % 2 == 0).then(|| n * 10)
        });
        assert_eq!(result, Some((2, 20)));
        assert_eq!(tried, vec![1, 2]);
    }

    #[test]
    fn test_first_success_none() {
        let result: Option<(i32, i32)> = first_success([1, 3, 5], |_| None);
        assert!(result.is_none());
    }

    #[test]
    fn test_first_success_empty() {
        let result: Option<(i32, ())> = first_success(Vec::<i32>::new(), |_| Some(()));
        assert!(result.is_none());
    }

    #[test]
    fn test_first_success_async_order() {
        let mut tried = Vec::new();
        let result = block_on(first_success_async(["a", "b", "c"], |name| {
            tried.push(name);
            async move { (name == "b").then(|| name.len()) }
        }));
        assert_eq!(result, Some(("b", 1)));
        assert_eq!(tried, vec!["a", "b"]);
    }
}
