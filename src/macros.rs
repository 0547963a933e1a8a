/// Compile a literal regex once and hand out a `&'static Regex`.
///
/// Only used for the fixed grammar expressions of the script language; rule
/// patterns are compiled at load time by `engine::pattern` instead.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).expect(concat!("invalid built-in regex: ", $pat)));
        &*RE
    }};
}
