//! Macros for compact rule-set construction.

/// Build a `Vec<TransitionRule>` from a compact listing.
///
/// Each entry is `name => { from: .., to: .. }` with optional
/// `validator`, `side_effect` and `timeout_ms` fields, in that order.
///
/// # Example
///
/// ```
/// use statusflow::transition_rules;
///
/// let rules = transition_rules![
///     "start" => { from: "TODO", to: "DOING" },
///     "finish" => {
///         from: ["DOING", "REVIEW"],
///         to: "DONE",
///         validator: "checks_green",
///         side_effect: "notify_owner",
///     },
/// ];
///
/// assert_eq!(rules.len(), 2);
/// assert_eq!(rules[1].validator.as_deref(), Some("checks_green"));
/// ```
#[macro_export]
macro_rules! transition_rules {
    (
        $(
            $name:literal => {
                from: $from:expr,
                to: $to:expr
                $(, validator: $validator:expr)?
                $(, side_effect: $side_effect:expr)?
                $(, timeout_ms: $timeout:expr)?
                $(,)?
            }
        ),* $(,)?
    ) => {
        vec![
            $(
                {
                    #[allow(unused_mut)]
                    let mut rule = $crate::rules::TransitionRule::new($name, $from, $to);
                    $( rule = rule.validated_by($validator); )?
                    $( rule = rule.with_side_effect($side_effect); )?
                    $( rule.timeout_ms = Some($timeout); )?
                    rule
                }
            ),*
        ]
    };
}
