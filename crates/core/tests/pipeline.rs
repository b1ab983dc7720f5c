//! End-to-end runs of the processing pipeline.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use textpager_core::prelude::*;
use textpager_core::session::overlap_len;
use textpager_core::title::TitleMatcher;

fn memory(name: &str, text: &str) -> MemorySource {
    MemorySource::new(name, text.as_bytes().to_vec())
}

fn bare() -> ProcessingOptions {
    ProcessingOptions {
        title_page: false,
        ..Default::default()
    }
}

fn assert_pages_cover(book: &ProcessedBook) {
    let pages = book.pages();
    assert_eq!(pages.first().map(|p| p.start), Some(0));
    assert_eq!(pages.last().map(|p| p.end), Some(book.line_count()));
    for pair in pages.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
        assert!(pair[0].start < pair[0].end);
    }
}

#[test]
fn chapter_titles_start_pages() {
    let mut session = ProcessingSession::new(
        memory("book.txt", "Chapter 1 Intro\nHello world.\nChapter 2 Next\nMore text."),
        bare(),
    );
    let book = session.run_to_completion().unwrap();
    let lines: Vec<usize> = book.titles.iter().map(|t| t.line).collect();
    assert_eq!(lines, vec![0, 2]);
    assert_eq!(book.page_breaks.as_slice(), &[0, 2]);
    assert_eq!(book.titles[0].short_title, "Intro");
    assert_pages_cover(&book);
}

#[test]
fn full_page_keeps_its_break_before_a_short_last_line() {
    let long: Vec<String> = (0..350).map(|i| format!("w{i}")).collect();
    let short: Vec<String> = (0..10).map(|i| format!("s{i}")).collect();
    let text = format!("{}\n{}\n", long.join(" "), short.join(" "));
    let mut session = ProcessingSession::new(memory("pages.txt", &text), bare());
    let book = session.run_to_completion().unwrap();
    assert_eq!(book.page_breaks.as_slice(), &[0, 1]);
    assert_pages_cover(&book);
}

#[test]
fn footnote_reference_and_definition() {
    let mut session = ProcessingSession::new(memory("notes.txt", "See note[1].\n[1] This is a footnote."), bare());
    session.detect_metadata().unwrap();
    let payload = session.process_initial_chunk().unwrap();
    assert_eq!(payload.html_lines.len(), 1);
    assert!(payload.html_lines[0].contains(r##"href="#footnote-0""##));
    assert_eq!(payload.footnotes.len(), 1);
    assert_eq!(payload.footnote_counter, 1);
}

#[test]
fn nested_title_reduces_to_body() {
    assert_eq!(TitleMatcher::default().shortest_title("卷一 第一章 测试"), "测试");
}

#[test]
fn small_file_completes_in_one_phase() {
    let mut session = ProcessingSession::new(memory("short.txt", "第一章 开始\n正文。\n"), ProcessingOptions::default());
    session.detect_metadata().unwrap();
    let payload = session.process_initial_chunk().unwrap();
    assert!(payload.is_final);
    assert_eq!(session.state(), SessionState::Complete);
    assert!(session.prev_chunk_info().is_none());
    assert!(matches!(
        session.process_remaining_content(),
        Err(PipelineError::Session(SessionError::InvalidState { .. }))
    ));
    assert_eq!(session.page_breaks().first(), Some(&0));
}

#[test]
fn three_mebibyte_file_runs_in_two_phases() {
    let paragraph = "It was a bright cold day in April, and the clocks were striking thirteen once more.\n";
    let mut text = String::new();
    let mut chapter = 0;
    while text.len() < 3 * 1024 * 1024 {
        chapter += 1;
        text.push_str(&format!("Chapter {chapter}\n"));
        for _ in 0..120 {
            text.push_str(paragraph);
        }
    }

    let mut session = ProcessingSession::new(memory("big.txt", &text), bare());
    session.detect_metadata().unwrap();
    let first = session.process_initial_chunk().unwrap();
    assert!(!first.is_final);
    let overlap = session.prev_chunk_info().unwrap().len();
    assert_eq!(overlap, overlap_len(first.html_lines.len(), 0.2));
    assert_eq!(overlap, (first.html_lines.len() as f64 * 0.2).ceil() as usize);

    let second = session.process_remaining_content().unwrap();
    assert!(second.is_final);
    assert_eq!(session.state(), SessionState::Complete);
    assert!(session.prev_chunk_info().is_none());

    session.generate_end_page().unwrap();
    let book = session.assemble().unwrap();
    assert_eq!(book.titles.len(), chapter);
    assert_eq!(book.html_lines.len(), chapter * 121);
    assert_eq!(book.titles_index.len(), book.titles.len());
    assert_pages_cover(&book);
}

#[test]
fn gbk_file_from_disk() {
    let text = "第一章 风起\n少年离开了家乡，踏上了漫长的旅途。\n第二章 云涌\n江湖从此不再平静。\n".repeat(10);
    let (bytes, _, _) = encoding_rs::GBK.encode(&text);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("风起云涌.txt");
    std::fs::write(&path, &bytes).unwrap();

    let mut session = ProcessingSession::new(FileSource::open(&path).unwrap(), bare());
    let meta = session.detect_metadata().unwrap();
    assert!(meta.is_eastern);
    assert_eq!(meta.book_name, "风起云涌");
    assert!(meta.encoding == "GBK" || meta.encoding == "gb18030");

    session.process_initial_chunk().unwrap();
    session.generate_end_page().unwrap();
    let book = session.assemble().unwrap();
    assert_eq!(book.titles.len(), 20);
    assert_eq!(book.titles[1].short_title, "云涌");
}

#[test]
fn inferred_rule_feeds_titles() {
    let mut text = String::new();
    for (i, name) in ["一", "二", "三", "四", "五"].iter().enumerate() {
        text.push_str(&format!("{name}、第{}段旅程\n", i + 1));
        for _ in 0..5 {
            text.push_str("他们沿着河流一直向前走，没有停下来。\n");
        }
    }
    let mut session = ProcessingSession::new(memory("旅程.txt", &text), bare());
    let book = session.run_to_completion().unwrap();
    assert!(session.custom_rule().is_some());
    assert_eq!(book.titles.len(), 5);
    assert!(book.titles.iter().all(|t| t.is_custom_only));
    assert_eq!(book.titles[0].short_title, "第1段旅程");
}

#[test]
fn payload_json_shape() {
    let mut session = ProcessingSession::new(memory("book.txt", "Chapter 1\nText."), bare());
    session.detect_metadata().unwrap();
    let payload = session.process_initial_chunk().unwrap();
    let json = serde_json::to_value(&payload).unwrap();
    for key in [
        "htmlLines",
        "titles",
        "titlesIndex",
        "footnoteCounter",
        "footnotes",
        "pageBreaks",
        "startLine",
        "isFinal",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["titles"][0], serde_json::json!(["Chapter 1", 0, "Chapter 1", false]));
}

#[derive(Debug, Clone)]
enum Line {
    Title,
    Paragraph(Vec<String>),
    Reference(Vec<String>),
}

fn words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{3,8}", 3..12)
}

fn line() -> impl Strategy<Value = Line> {
    prop_oneof![
        1 => Just(Line::Title),
        6 => words().prop_map(Line::Paragraph),
        1 => words().prop_map(Line::Reference),
    ]
}

/// Render generated lines; returns the text, the expected number of
/// content lines and of titles.
fn render(lines: &[Line]) -> (String, usize, usize) {
    let mut text = String::new();
    let mut chapter = 0;
    let mut note = 0;
    let mut content = 0;
    for line in lines {
        match line {
            Line::Title => {
                chapter += 1;
                text.push_str(&format!("Chapter {chapter}\n"));
                content += 1;
            }
            Line::Paragraph(words) => {
                text.push_str(&words.join(" "));
                text.push('\n');
                content += 1;
            }
            Line::Reference(words) => {
                note += 1;
                text.push_str(&format!("{}[{note}].\n[{note}] {}\n", words.join(" "), words[0]));
                content += 1;
            }
        }
    }
    (text, content, chapter)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn chunking_never_loses_or_duplicates_lines(
        lines in prop::collection::vec(line(), 1..300),
        chunk in 64u64..4096,
        page in 5usize..80,
    ) {
        let (text, content, chapters) = render(&lines);
        let options = ProcessingOptions {
            initial_chunk_size: chunk,
            pagination: textpager_core::paginate::PaginationOptions {
                western_page_size: page,
                ..Default::default()
            },
            ..bare()
        };
        let mut session = ProcessingSession::new(memory("generated.txt", &text), options);
        let book = session.run_to_completion().unwrap();

        prop_assert_eq!(book.html_lines.len(), content);
        prop_assert_eq!(book.titles.len(), chapters);
        prop_assert_eq!(book.titles_index.len(), book.titles.len());
        let breaks = book.page_breaks.as_slice();
        prop_assert_eq!(breaks.first().copied(), Some(0));
        prop_assert!(breaks.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(breaks.iter().all(|&b| b < book.line_count()));
        for title in &book.titles {
            let nested = title.line > 0 && book.titles_index.contains(title.line - 1);
            prop_assert!(nested || breaks.contains(&title.line));
        }
        let ids: Vec<usize> = book.footnotes.iter().map(|f| f.id).collect();
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
