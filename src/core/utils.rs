//! 核心工具函数

/// 获取当前Unix时间戳（毫秒）
///
/// 诊断记录用它排序同一秒内的多条记录。
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let first = current_timestamp_ms();
        let second = current_timestamp_ms();
        assert!(first > 0);
        assert!(second >= first);
    }
}
