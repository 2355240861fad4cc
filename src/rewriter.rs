//! Position-preserving rewrite of detected spans into placeholders.

use crate::models::DetectedSpan;

/// Splice `placeholders[i]` over `spans[i]` in `text`. Spans must satisfy
/// the non-overlap invariant; replacement walks descending start order so
/// earlier offsets stay valid while later ones are rewritten.
pub fn apply_replacements(text: &str, spans: &[DetectedSpan], placeholders: &[String]) -> String {
    debug_assert_eq!(spans.len(), placeholders.len());

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(spans[i].start));

    let mut result = text.to_string();
    for i in order {
        let span = &spans[i];
        result.replace_range(span.start..span.end, &placeholders[i]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    fn span(text: &str, needle: &str) -> DetectedSpan {
        let start = text.find(needle).unwrap();
        DetectedSpan::new(
            EntityKind::Person,
            needle,
            start,
            start + needle.len(),
            0.9,
            "test",
        )
    }

    #[test]
    fn test_rewrites_in_place() {
        let text = "Mario Rossi e Luca Bianchi";
        let spans = vec![span(text, "Mario Rossi"), span(text, "Luca Bianchi")];
        let placeholders = vec!["PERSON_A".to_string(), "PERSON_B".to_string()];
        assert_eq!(
            apply_replacements(text, &spans, &placeholders),
            "PERSON_A e PERSON_B"
        );
    }

    #[test]
    fn test_unaffected_bytes_preserved() {
        let text = "preambolo — Mario Rossi — epilogo";
        let spans = vec![span(text, "Mario Rossi")];
        let placeholders = vec!["X".to_string()];
        assert_eq!(
            apply_replacements(text, &spans, &placeholders),
            "preambolo — X — epilogo"
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let text = "aa bb cc";
        let mut spans = vec![span(text, "cc"), span(text, "aa")];
        spans.swap(0, 1);
        let placeholders = vec!["1".to_string(), "2".to_string()];
        let out = apply_replacements(text, &spans, &placeholders);
        assert_eq!(out, "1 bb 2");
    }
}
