/// Render a duration in whole seconds for the timer display.
///
/// With `with_minutes` the result is `M:SS` (minutes unpadded). Without it only
/// the seconds are shown as `:SS`, which is how short intervals are displayed.
pub fn format_clock(seconds: i64, with_minutes: bool) -> String {
    let seconds = seconds.max(0);
    if with_minutes {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        format!(":{:02}", seconds % 60)
    }
}
