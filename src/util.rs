use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

/// Canonical form of a selector name: lowercase, with whitespace, `_` and `-` removed.
///
/// `"Leaky_ReLU"`, `"leaky relu"` and `"leaky-relu"` all become `"leakyrelu"`.
pub fn format_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Human-readable elapsed time, e.g. `"742ms"`, `"3.25s"`, `"2m 5s"`, `"1h 4m 12s"`.
pub fn format_duration(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        return format!("{ms}ms");
    }
    let secs = elapsed.as_secs();
    if secs < 60 {
        return format!("{:.2}s", elapsed.as_secs_f64());
    }
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else {
        format!("{m}m {s}s")
    }
}

/// Permutes `data` in place.
pub fn shuffle<T, R: Rng + ?Sized>(data: &mut [T], rng: &mut R) {
    data.shuffle(rng);
}
