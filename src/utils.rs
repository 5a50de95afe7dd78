use std::str::FromStr;

use crate::types::Vertex;

/// Parse `"x,y"` into a pair
pub fn parse_pair<T: FromStr>(s: &str) -> Result<(T, T), String>
where
    <T as FromStr>::Err: std::fmt::Display,
{
    let v = s.split(',').collect::<Vec<_>>();
    if v.len() != 2 {
        return Err(format!("expected `x,y`, found `{s}`"))
    }
    let parse = |t: &str| t.trim().parse::<T>().map_err(|e| format!("`{t}` in `{s}`: {e}"));
    Ok((parse(v[0])?, parse(v[1])?))
}

/// Polygon vertex given on the command line as `x,y`
pub fn parse_vertex(s: &str) -> Result<Vertex, String> { parse_pair(s) }

/// Group numeric digits to facilitate reading long numbers
pub fn group_digits<F: std::fmt::Display>(n: F) -> String {
    use numsep::{separate, Locale};
    separate(n, Locale::English)
}
