//! HTML fragments for lines, footnotes and the generated title/end pages.

use crate::title::TitleLevel;

/// Ornament shown on the end page.
pub const END_PAGE_MARK: &str = "❧";

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Paragraph line; `content` is already escaped.
pub fn paragraph(index: usize, content: &str) -> String {
    format!(r#"<p id="line{index}">{content}</p>"#)
}

/// Heading line; `content` is already escaped.
pub fn title(index: usize, content: &str, level: TitleLevel) -> String {
    let tag = match level {
        TitleLevel::Volume => "h2",
        _ => "h3",
    };
    format!(r#"<{tag} id="line{index}" class="title">{content}</{tag}>"#)
}

pub fn footnote_ref(id: usize, marker: &str) -> String {
    format!(r##"<sup class="footnote-ref"><a href="#footnote-{id}">{marker}</a></sup>"##)
}

pub fn footnote_item(id: usize, body: &str) -> String {
    format!(r#"<li id="footnote-{id}" class="footnote">{}</li>"#, escape(body))
}

/// Heading lines of the title page, starting at line 0. The rule line
/// separates the page from the content.
pub fn title_page(book_name: &str, author: &str) -> Vec<String> {
    let mut lines = vec![format!(
        r#"<h1 id="line0" class="title-page-name">{}</h1>"#,
        escape(book_name)
    )];
    if !author.is_empty() {
        lines.push(format!(
            r#"<h2 id="line1" class="title-page-author">{}</h2>"#,
            escape(author)
        ));
    }
    let rule_index = lines.len();
    lines.push(format!(r#"<hr id="line{rule_index}" class="title-page-rule">"#));
    lines
}

/// Number of lines [`title_page`] produces.
pub fn title_page_len(author: &str) -> usize {
    if author.is_empty() {
        2
    } else {
        3
    }
}

pub fn end_page(index: usize) -> String {
    format!(r#"<div id="line{index}" class="end-page">{END_PAGE_MARK}</div>"#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }

    #[test]
    fn title_tags_follow_level() {
        assert_eq!(
            title(4, "卷一", TitleLevel::Volume),
            r#"<h2 id="line4" class="title">卷一</h2>"#
        );
        assert_eq!(
            title(5, &escape("Chapter 1 <Intro>"), TitleLevel::Chapter),
            r#"<h3 id="line5" class="title">Chapter 1 &lt;Intro&gt;</h3>"#
        );
    }

    #[test]
    fn title_page_with_and_without_author() {
        let page = title_page("红楼梦", "曹雪芹");
        assert_eq!(page.len(), title_page_len("曹雪芹"));
        assert_eq!(page[2], r#"<hr id="line2" class="title-page-rule">"#);

        let page = title_page("Untitled", "");
        assert_eq!(page.len(), 2);
        assert_eq!(page[1], r#"<hr id="line1" class="title-page-rule">"#);
    }

    #[test]
    fn end_page_line() {
        assert_eq!(end_page(42), r#"<div id="line42" class="end-page">❧</div>"#);
    }
}
