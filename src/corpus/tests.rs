use super::*;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent dirs");
    }
    fs::write(path, content).expect("should write test file");
}

#[test]
fn loads_only_txt_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write(temp_dir.path(), "b.txt", "second release");
    write(temp_dir.path(), "a.txt", "first release");
    write(temp_dir.path(), "notes.md", "# not a press release");
    write(temp_dir.path(), "upper.TXT", "extension is case sensitive");
    write(temp_dir.path(), "archive.txt.bak", "backup");

    let documents = load_documents(temp_dir.path(), false).expect("should load corpus");

    assert_eq!(
        documents,
        vec![
            SourceDocument {
                source: "a.txt".to_string(),
                text: "first release".to_string(),
            },
            SourceDocument {
                source: "b.txt".to_string(),
                text: "second release".to_string(),
            },
        ]
    );
}

#[test]
fn non_recursive_skips_subdirectories() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write(temp_dir.path(), "top.txt", "top level");
    write(temp_dir.path(), "2023/q1.txt", "nested");

    let documents = load_documents(temp_dir.path(), false).expect("should load corpus");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].source, "top.txt");
}

#[test]
fn recursive_walks_subdirectories() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    write(temp_dir.path(), "top.txt", "top level");
    write(temp_dir.path(), "2023/q1.txt", "nested");
    write(temp_dir.path(), "2023/deeper/q2.txt", "deeper");

    let documents = load_documents(temp_dir.path(), true).expect("should load corpus");
    let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(sources, vec!["2023/deeper/q2.txt", "2023/q1.txt", "top.txt"]);
}

#[test]
fn empty_directory_yields_no_documents() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let documents = load_documents(temp_dir.path(), true).expect("should load empty corpus");
    assert!(documents.is_empty());
}

#[test]
fn missing_directory_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = load_documents(&temp_dir.path().join("missing"), false);
    assert!(result.is_err());
}

#[test]
fn preserves_text_exactly() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let text = "Line one\r\n\nLine two with ünïcode — and trailing space \n";
    write(temp_dir.path(), "release.txt", text);

    let documents = load_documents(temp_dir.path(), false).expect("should load corpus");
    assert_eq!(documents[0].text, text);
}

#[cfg(unix)]
#[test]
fn follows_symlinked_files_and_directories() {
    use std::os::unix::fs::symlink;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let outside = TempDir::new().expect("should create temp dir");
    write(outside.path(), "shared.txt", "release kept elsewhere");
    write(outside.path(), "archive/2023.txt", "archived release");

    let corpus = temp_dir.path();
    write(corpus, "plain.txt", "local release");
    symlink(outside.path().join("shared.txt"), corpus.join("link.txt"))
        .expect("should create file symlink");
    symlink(outside.path().join("archive"), corpus.join("archive"))
        .expect("should create dir symlink");

    let flat = load_documents(corpus, false).expect("should load corpus");
    let sources: Vec<&str> = flat.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(sources, vec!["link.txt", "plain.txt"]);
    assert_eq!(flat[0].text, "release kept elsewhere");

    let recursive = load_documents(corpus, true).expect("should load corpus");
    let sources: Vec<&str> = recursive.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(sources, vec!["archive/2023.txt", "link.txt", "plain.txt"]);
}
