//! Whole-run tests with a synthetic renderer and a scripted vision model.
//!
//! Nothing here needs pdfium or network access: the renderer paints solid
//! pages and the model answers from a per-page script, so every run is
//! deterministic.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use pdf2table::{
    extract_from_bytes, extract_table, ExtractionConfig, ExtractionProgressCallback,
    PageRenderer, PageSink, Pdf2TableError, RenderOptions, VisionModel, VisionReply,
    VisionRequest,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test doubles ─────────────────────────────────────────────────────────────

struct BlankPages(usize);

impl PageRenderer for BlankPages {
    fn render(
        &self,
        _pdf_path: &Path,
        _options: &RenderOptions,
        sink: &mut PageSink<'_>,
    ) -> Result<usize, Pdf2TableError> {
        for idx in 0..self.0 {
            sink(idx, DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 30, Rgb([250, 250, 250]))))?;
        }
        Ok(self.0)
    }
}

struct BrokenPdf;

impl PageRenderer for BrokenPdf {
    fn render(
        &self,
        pdf_path: &Path,
        _options: &RenderOptions,
        _sink: &mut PageSink<'_>,
    ) -> Result<usize, Pdf2TableError> {
        Err(Pdf2TableError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: "xref table missing".into(),
        })
    }
}

enum Answer {
    Text(&'static str),
    ApiError(&'static str),
}

/// Answers page N with `script[N]`; records every page it was asked about.
struct ScriptedModel {
    script: HashMap<usize, Answer>,
    asked: Mutex<Vec<usize>>,
    temp_root: Option<PathBuf>,
}

impl ScriptedModel {
    fn new(script: Vec<(usize, Answer)>) -> Arc<Self> {
        Arc::new(Self {
            script: script.into_iter().collect(),
            asked: Mutex::new(Vec::new()),
            temp_root: None,
        })
    }

    fn watching(temp_root: &Path, script: Vec<(usize, Answer)>) -> Arc<Self> {
        Arc::new(Self {
            script: script.into_iter().collect(),
            asked: Mutex::new(Vec::new()),
            temp_root: Some(temp_root.to_path_buf()),
        })
    }

    fn asked(&self) -> Vec<usize> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionReply, Pdf2TableError> {
        self.asked.lock().unwrap().push(request.page_num);

        assert_eq!(request.image.mime_type, "image/jpeg");
        assert!(!request.image.data.is_empty());
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 8192);
        assert!(request.prompt.contains(&format!(
            "page {} of {}",
            request.page_num, request.total_pages
        )));

        // While pages are being extracted, their images sit in the run folder.
        if let Some(ref root) = self.temp_root {
            let folders: Vec<_> = std::fs::read_dir(root).unwrap().flatten().collect();
            assert_eq!(folders.len(), 1);
            let name = folders[0].file_name().to_string_lossy().into_owned();
            assert!(name.starts_with("pdf_images_"), "got {name}");
            let page = folders[0].path().join(format!("page_{}.jpg", request.page_num));
            assert!(page.is_file(), "missing {}", page.display());
        }

        match self.script.get(&request.page_num) {
            Some(Answer::Text(text)) => Ok(VisionReply {
                text: text.to_string(),
                input_tokens: 1000,
                output_tokens: 50,
            }),
            Some(Answer::ApiError(msg)) => Err(Pdf2TableError::LlmApiError {
                page: request.page_num,
                message: msg.to_string(),
            }),
            None => panic!("no scripted answer for page {}", request.page_num),
        }
    }
}

/// Replaces the output directory with a plain file before answering, so the
/// CSV write that follows must fail.
struct BlocksOutput {
    output_dir: PathBuf,
}

#[async_trait]
impl VisionModel for BlocksOutput {
    fn name(&self) -> &str {
        "blocks-output"
    }

    async fn complete(&self, _request: &VisionRequest) -> Result<VisionReply, Pdf2TableError> {
        std::fs::remove_dir_all(&self.output_dir).unwrap();
        std::fs::write(&self.output_dir, b"not a directory").unwrap();
        Ok(VisionReply {
            text: r#"[{"Commodity Name":"Widget","Qty":5,"UOM":"BOX"}]"#.to_string(),
            ..Default::default()
        })
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ExtractionProgressCallback for Recorder {
    fn on_extraction_start(&self, total_pages: usize) {
        self.0.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_start(&self, page_num: usize, _total_pages: usize) {
        self.0.lock().unwrap().push(format!("page {page_num}"));
    }
    fn on_page_complete(&self, page_num: usize, _total_pages: usize, item_count: usize) {
        self.0.lock().unwrap().push(format!("done {page_num} ({item_count})"));
    }
    fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.0.lock().unwrap().push(format!("error {page_num}"));
    }
    fn on_extraction_complete(&self, total_pages: usize, total_items: usize) {
        self.0.lock().unwrap().push(format!("complete {total_pages} {total_items}"));
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.root.path().join("output")
    }

    fn temp_dir(&self) -> PathBuf {
        self.root.path().join("temp")
    }

    /// A file that passes the `%PDF` check; the fake renderers never parse it.
    fn pdf(&self, name: &str) -> PathBuf {
        let path = self.root.path().join(name);
        std::fs::write(&path, b"%PDF-1.7\n%fake\n").unwrap();
        path
    }

    fn config(
        &self,
        renderer: Arc<dyn PageRenderer>,
        model: Arc<dyn VisionModel>,
    ) -> pdf2table::ExtractionConfigBuilder {
        ExtractionConfig::builder()
            .output_dir(self.output_dir())
            .temp_dir(self.temp_dir())
            .renderer(renderer)
            .vision_model(model)
    }

    fn csv_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.output_dir()) {
            Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn temp_entries(&self) -> usize {
        std::fs::read_dir(self.temp_dir()).unwrap().count()
    }
}

fn read_csv(path: &Path) -> String {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(&bytes[..3], b"\xEF\xBB\xBF", "CSV must start with a UTF-8 BOM");
    String::from_utf8(bytes[3..].to_vec()).unwrap()
}

// ── Success paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_page_packing_list_becomes_one_csv() {
    let ws = Workspace::new();
    let pdf = ws.pdf("packing_list.pdf");
    let model = ScriptedModel::watching(
        &ws.temp_dir(),
        vec![
            (1, Answer::Text(r#"[{"Commodity Name":"Widget","Qty":5,"UOM":"BOX"}]"#)),
            (2, Answer::Text(r#"[{"Commodity Name":"Gadget"}]"#)),
        ],
    );
    let config = ws
        .config(Arc::new(BlankPages(2)), model.clone())
        .build()
        .unwrap();

    let output = extract_table(pdf.to_string_lossy(), &config).await.unwrap();

    assert_eq!(model.asked(), vec![1, 2]);
    assert_eq!(ws.csv_files(), vec![output.csv_path.clone()]);

    let name = output.csv_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("packing_list_"), "got {name}");
    assert!(name.ends_with(".csv"));

    let text = read_csv(&output.csv_path);
    assert_eq!(
        text.lines().collect::<Vec<_>>(),
        vec!["Commodity Name,Qty,UOM", "Widget,5,BOX", "Gadget,1,BOX"]
    );

    assert_eq!(output.stats.total_pages, 2);
    assert_eq!(output.stats.total_items, 2);
    assert_eq!(output.stats.repaired_rows, 1);
    assert_eq!(output.stats.total_input_tokens, 2000);
    assert_eq!(output.stats.total_output_tokens, 100);
    assert_eq!(ws.temp_entries(), 0, "page folder must be removed");
}

#[tokio::test]
async fn table_is_concatenation_of_pages_in_order() {
    let ws = Workspace::new();
    let pdf = ws.pdf("invoice.pdf");
    let model = ScriptedModel::new(vec![
        (
            1,
            Answer::Text(
                r#"[{"Commodity Name":"A","Qty":1,"UOM":"PCS"},{"Commodity Name":"B","Qty":2,"UOM":"PCS"}]"#,
            ),
        ),
        (2, Answer::Text("[]")),
        (
            3,
            Answer::Text(
                "```json\n[{\"Commodity Name\":\"C\",\"Qty\":\"1,200\",\"UOM\":\"KG\"}]\n```",
            ),
        ),
    ]);
    let config = ws.config(Arc::new(BlankPages(3)), model).build().unwrap();

    let output = extract_table(pdf.to_string_lossy(), &config).await.unwrap();

    let per_page: usize = output.pages.iter().map(|p| p.items.len()).sum();
    assert_eq!(output.items.len(), per_page);
    assert_eq!(
        output.pages.iter().map(|p| p.page_num).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let names: Vec<&str> = output.items.iter().map(|i| i.commodity_name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let text = read_csv(&output.csv_path);
    assert_eq!(text.lines().last(), Some("C,1200,KG"));
}

#[tokio::test]
async fn empty_document_writes_header_only() {
    let ws = Workspace::new();
    let pdf = ws.pdf("empty.pdf");
    let model = ScriptedModel::new(vec![]);
    let config = ws.config(Arc::new(BlankPages(0)), model.clone()).build().unwrap();

    let output = extract_table(pdf.to_string_lossy(), &config).await.unwrap();

    assert!(model.asked().is_empty());
    assert_eq!(read_csv(&output.csv_path), "Commodity Name,Qty,UOM\n");
    assert_eq!(ws.temp_entries(), 0);
}

#[tokio::test]
async fn progress_events_follow_page_order() {
    let ws = Workspace::new();
    let pdf = ws.pdf("list.pdf");
    let recorder = Arc::new(Recorder::default());
    let model = ScriptedModel::new(vec![
        (1, Answer::Text(r#"[{"Commodity Name":"X","Qty":3,"UOM":"SET"}]"#)),
        (2, Answer::Text("[]")),
    ]);
    let config = ws
        .config(Arc::new(BlankPages(2)), model)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    extract_table(pdf.to_string_lossy(), &config).await.unwrap();

    assert_eq!(
        recorder.events(),
        vec![
            "start 2",
            "page 1",
            "done 1 (1)",
            "page 2",
            "done 2 (0)",
            "complete 2 1",
        ]
    );
}

#[tokio::test]
async fn bytes_input_is_named_after_file_name() {
    let ws = Workspace::new();
    let model = ScriptedModel::new(vec![(
        1,
        Answer::Text(r#"[{"Commodity Name":"Pallet","Qty":4,"UOM":"PLT"}]"#),
    )]);
    let config = ws.config(Arc::new(BlankPages(1)), model).build().unwrap();

    let output = extract_from_bytes(b"%PDF-1.4\n", "orders/march.pdf", &config)
        .await
        .unwrap();

    let name = output.csv_path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("march_"), "got {name}");
    assert_eq!(output.csv_path.parent(), Some(ws.output_dir().as_path()));
}

// ── Failure paths ────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_json_aborts_without_csv_and_cleans_up() {
    let ws = Workspace::new();
    let pdf = ws.pdf("bad.pdf");
    let recorder = Arc::new(Recorder::default());
    let model = ScriptedModel::new(vec![
        (1, Answer::Text("Sorry, I cannot read this page.")),
        (2, Answer::Text("[]")),
    ]);
    let config = ws
        .config(Arc::new(BlankPages(2)), model.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = extract_table(pdf.to_string_lossy(), &config).await.unwrap_err();

    assert!(
        matches!(err, Pdf2TableError::MalformedResponse { page: 1, .. }),
        "got {err:?}"
    );
    assert_eq!(model.asked(), vec![1], "later pages must not be attempted");
    assert!(ws.csv_files().is_empty(), "no CSV on failure");
    assert_eq!(ws.temp_entries(), 0, "page folder must be removed on failure");
    assert_eq!(recorder.events(), vec!["start 2", "page 1", "error 1"]);
}

#[tokio::test]
async fn api_error_on_later_page_discards_earlier_rows() {
    let ws = Workspace::new();
    let pdf = ws.pdf("rate_limited.pdf");
    let model = ScriptedModel::new(vec![
        (1, Answer::Text(r#"[{"Commodity Name":"Kept?","Qty":1,"UOM":"BOX"}]"#)),
        (2, Answer::ApiError("429 Too Many Requests")),
    ]);
    let config = ws.config(Arc::new(BlankPages(3)), model.clone()).build().unwrap();

    let err = extract_table(pdf.to_string_lossy(), &config).await.unwrap_err();

    assert!(matches!(err, Pdf2TableError::LlmApiError { page: 2, .. }), "got {err:?}");
    assert_eq!(model.asked(), vec![1, 2]);
    assert!(ws.csv_files().is_empty());
    assert_eq!(ws.temp_entries(), 0);
}

#[tokio::test]
async fn rasterisation_failure_skips_extraction() {
    let ws = Workspace::new();
    let pdf = ws.pdf("corrupt.pdf");
    let model = ScriptedModel::new(vec![]);
    let config = ws.config(Arc::new(BrokenPdf), model.clone()).build().unwrap();

    let err = extract_table(pdf.to_string_lossy(), &config).await.unwrap_err();

    assert!(matches!(err, Pdf2TableError::CorruptPdf { .. }), "got {err:?}");
    assert!(model.asked().is_empty());
    assert!(ws.csv_files().is_empty());
    assert_eq!(ws.temp_entries(), 0);
}

#[tokio::test]
async fn missing_input_file_is_an_input_error() {
    let ws = Workspace::new();
    let model = ScriptedModel::new(vec![]);
    let config = ws.config(Arc::new(BlankPages(1)), model.clone()).build().unwrap();
    let missing = ws.root.path().join("nope.pdf");

    let err = extract_table(missing.to_string_lossy(), &config).await.unwrap_err();

    assert!(matches!(err, Pdf2TableError::FileNotFound { .. }), "got {err:?}");
    assert!(model.asked().is_empty());
    assert_eq!(ws.temp_entries(), 0, "no page folder before the input resolves");
}

#[tokio::test]
async fn missing_credential_fails_before_any_directory_exists() {
    // Only meaningful when the key is genuinely absent from this environment.
    if std::env::var("MISTRAL_API_KEY").is_ok_and(|v| !v.trim().is_empty()) {
        println!("SKIP: MISTRAL_API_KEY is set");
        return;
    }

    let ws = Workspace::new();
    let pdf = ws.pdf("invoice.pdf");
    let config = ExtractionConfig::builder()
        .output_dir(ws.output_dir())
        .temp_dir(ws.temp_dir())
        .provider_name("mistral")
        .model("pixtral-large-latest")
        .build()
        .unwrap();

    let err = extract_table(pdf.to_string_lossy(), &config).await.unwrap_err();

    assert!(
        matches!(err, Pdf2TableError::MissingCredential { ref var, .. } if var == "MISTRAL_API_KEY"),
        "got {err:?}"
    );
    assert!(!ws.output_dir().exists());
    assert!(!ws.temp_dir().exists());
}

#[tokio::test]
async fn csv_write_failure_still_removes_page_folder() {
    let ws = Workspace::new();
    let pdf = ws.pdf("blocked.pdf");
    let model = Arc::new(BlocksOutput {
        output_dir: ws.output_dir(),
    });
    let config = ws.config(Arc::new(BlankPages(1)), model).build().unwrap();

    let err = extract_table(pdf.to_string_lossy(), &config).await.unwrap_err();

    assert_eq!(err.kind(), pdf2table::ErrorKind::Write, "got {err:?}");
    assert_eq!(ws.temp_entries(), 0, "page folder must be removed after a failed write");
}
