//! 核心宏定义

/// 用字段初始值同时实现 `Default` 和 `new()`
///
/// ```rust
/// use script_bridge::impl_default_and_new;
///
/// struct PendingCounter {
///     pending: usize,
///     label: String,
/// }
///
/// impl_default_and_new!(PendingCounter {
///     pending: 0,
///     label: "timers".to_string(),
/// });
///
/// assert_eq!(PendingCounter::new().label, "timers");
/// ```
#[macro_export]
macro_rules! impl_default_and_new {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }

        impl $struct_name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    struct Inbox {
        messages: VecDeque<String>,
        capacity: usize,
    }

    impl_default_and_new!(Inbox {
        messages: VecDeque::new(),
        capacity: 64,
    });

    #[test]
    fn test_new_matches_default() {
        let inbox = Inbox::new();
        assert!(inbox.messages.is_empty());
        assert_eq!(inbox.capacity, Inbox::default().capacity);
    }
}
