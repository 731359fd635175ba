//! The legal-basis taxonomy (§6): `entry_type` combined with the decision's
//! org/number maps to a fixed string key, used by the Entry-type index and
//! the summary histogram.

/// Derive the taxonomy key for a record's `entry_type` and decision triple.
pub fn taxonomy_key(entry_type: i32, org: &str, number: &str) -> &'static str {
    match entry_type {
        1 if org == "Роскомнадзор" && number.ends_with("-СОБ") => "15_1_1m",
        1 if org == "Генпрокуратура" || org.is_empty() => "15_1_1",
        2 => "15_2",
        3 => "15_3",
        4 => "15_4",
        5 if org == "Мосгорсуд" => "15_6",
        5 if org == "Минцифра" || org == "Минкомсвязь" => "15_6_1",
        6 => "15_5",
        7 => "15_8",
        8 => "15_9",
        _ => "15_1",
    }
}
