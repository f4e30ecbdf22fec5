use scraper::{Html, Node};

/// Characters of summary text kept before the ellipsis.
pub const SUMMARY_BUDGET: usize = 300;
pub const ELLIPSIS: &str = "...";

/// Reduce feed-supplied HTML to plain text.
///
/// Text nodes are kept and everything else dropped, including the bodies of
/// `script` and `style` elements. Entity-escaped markup decodes back into
/// angle brackets here, so the result is passed through [`defang`] as well.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);

    let mut text = String::new();
    for node in fragment.tree.root().descendants() {
        let Node::Text(chunk) = node.value() else {
            continue;
        };
        let in_raw_element = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(e) if matches!(e.name(), "script" | "style"))
        });
        if !in_raw_element {
            text.push_str(chunk);
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    defang(&collapsed)
}

/// Remove every angle bracket so no tag syntax can survive.
pub fn defang(text: &str) -> String {
    text.replace(['<', '>'], "")
}

/// Plain-text summary cut to [`SUMMARY_BUDGET`] characters plus [`ELLIPSIS`].
pub fn clean_summary(raw: &str) -> String {
    let mut summary: String = plain_text(raw).chars().take(SUMMARY_BUDGET).collect();
    summary.push_str(ELLIPSIS);
    summary
}
