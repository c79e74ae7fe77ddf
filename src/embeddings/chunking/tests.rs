use super::*;

fn document(source: &str, text: &str) -> SourceDocument {
    SourceDocument {
        source: source.to_string(),
        text: text.to_string(),
    }
}

fn small_config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
    ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
}

fn press_release() -> String {
    let paragraph = "T-Systems announced a new sovereign cloud offering for public sector customers. \
                     The platform runs in German data centers and is operated under European law.";
    let mut text = String::new();
    for i in 0..12 {
        text.push_str(&format!("Section {i}\n{paragraph}\n\n"));
    }
    text
}

#[test]
fn small_document_is_a_single_identical_chunk() {
    let text = "Short release.\n\nWith two paragraphs.";
    let chunks = chunk_documents(&[document("a.txt", text)], &ChunkingConfig::default())
        .expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, text);
    assert_eq!(chunks[0].id, "a.txt#0");
    assert_eq!(chunks[0].chunk_index, 0);
}

#[test]
fn chunks_never_exceed_chunk_size() {
    let text = press_release();
    for (size, overlap) in [(50, 0), (120, 0), (200, 40), (1000, 0)] {
        let config = small_config(size, overlap);
        for chunk in split_text(&text, &config) {
            assert!(
                chunk.chars().count() <= size,
                "chunk of {} chars exceeds {}",
                chunk.chars().count(),
                size
            );
        }
    }
}

#[test]
fn chunks_concatenate_back_to_the_document() {
    let text = press_release();
    let config = small_config(150, 0);

    let pieces = split_text(&text, &config);
    assert!(pieces.len() > 1);
    assert_eq!(pieces.concat(), text);
}

#[test]
fn text_without_separators_is_split_by_characters() {
    let text = "x".repeat(25);
    let pieces = split_text(&text, &small_config(10, 0));
    assert_eq!(pieces, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
}

#[test]
fn multibyte_text_is_split_on_character_boundaries() {
    let text = "äöü€".repeat(10);
    let pieces = split_text(&text, &small_config(7, 0));
    assert!(pieces.iter().all(|p| p.chars().count() <= 7));
    assert_eq!(pieces.concat(), text);
}

#[test]
fn overlap_repeats_trailing_context() {
    let text = "one two three four five six seven eight nine ten";
    let pieces = split_text(text, &small_config(15, 6));

    assert!(pieces.len() > 1);
    for pair in pieces.windows(2) {
        let previous_last_word = pair[0].split_whitespace().last().expect("non-empty chunk");
        assert!(
            pair[1].contains(previous_last_word),
            "{:?} should start with context from {:?}",
            pair[1],
            pair[0]
        );
    }
}

#[test]
fn empty_documents_produce_no_chunks() {
    let chunks = chunk_documents(
        &[document("empty.txt", ""), document("full.txt", "content")],
        &ChunkingConfig::default(),
    )
    .expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].source, "full.txt");
}

#[test]
fn at_least_one_chunk_per_document_in_input_order() {
    let documents = vec![
        document("b.txt", &press_release()),
        document("a.txt", "tiny"),
        document("c.txt", "another short one"),
    ];
    let chunks =
        chunk_documents(&documents, &small_config(300, 0)).expect("chunking should succeed");

    assert!(chunks.len() >= documents.len());

    let mut seen_sources: Vec<&str> = Vec::new();
    for chunk in &chunks {
        if seen_sources.last() != Some(&chunk.source.as_str()) {
            seen_sources.push(&chunk.source);
        }
    }
    assert_eq!(seen_sources, vec!["b.txt", "a.txt", "c.txt"]);

    let b_indices: Vec<usize> = chunks
        .iter()
        .filter(|c| c.source == "b.txt")
        .map(|c| c.chunk_index)
        .collect();
    assert_eq!(b_indices, (0..b_indices.len()).collect::<Vec<_>>());
}

#[test]
fn invalid_configuration_is_rejected() {
    let documents = [document("a.txt", "text")];
    assert!(matches!(
        chunk_documents(&documents, &small_config(0, 0)),
        Err(ConfigError::InvalidChunkSize(0))
    ));
    assert!(matches!(
        chunk_documents(&documents, &small_config(10, 10)),
        Err(ConfigError::ChunkOverlapTooLarge(10, 10))
    ));
}
