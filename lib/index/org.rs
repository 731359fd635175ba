//! Decision-organisation normalisation (§6) for the Org index.

/// Normalise a decision's `org` field for indexing: empty becomes the
/// prosecutor general, any court other than the Moscow city court folds to
/// a single "Суд" bucket, the bailiff service folds to "ФССП", everything
/// else passes through verbatim.
pub fn normalize_org(org: &str) -> String {
    if org.is_empty() {
        return "Генпрокуратура".to_string();
    }
    if org != "Мосгорсуд" && (org.contains("суд") || org.contains("Суд")) {
        return "Суд".to_string();
    }
    if org.contains("ФССП") {
        return "ФССП".to_string();
    }
    org.to_string()
}
