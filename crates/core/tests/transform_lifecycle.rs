//! Transform lifecycle integration tests.
//!
//! These tests drive the service end to end with mock channels and a mock
//! mimetype lookup:
//! - Pipelines spooling intermediates between steps
//! - Failover exhaustion and the trace it leaves
//! - Mimetype-mismatch recovery and strict checking
//! - Pass-through and option filtering

use std::collections::HashMap;
use std::sync::Arc;

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use transform_core::{
    debug::{CallKind, NO_TRANSFORMERS},
    registry::PipelineStep,
    testing::{
        fixtures::{self, DOCX, JPEG, PDF},
        MockChannelFactory, MockMimetypeLookup,
    },
    ContentWriter,
    EngineSettings,
    MemoryContentReader,
    MemoryContentWriter,
    RegistryError,
    StrictMimetypeExceptions,
    SupportedTransform,
    TransformError,
    TransformService,
    TransformerSpec,
};

const DOC: &str = "application/msword";
const TEXT: &str = "text/plain";
const PAGES: &str = "application/x-iwork-pages";
const ZIP: &str = "application/zip";

/// Test helper wiring a service to mocks.
struct TestHarness {
    service: TransformService,
    factory: Arc<MockChannelFactory>,
    lookup: Arc<MockMimetypeLookup>,
    spool_dir: TempDir,
}

impl TestHarness {
    fn new(specs: Vec<TransformerSpec>) -> Self {
        Self::with_settings(
            specs,
            EngineSettings::default(),
            StrictMimetypeExceptions::default(),
        )
    }

    fn with_settings(
        specs: Vec<TransformerSpec>,
        settings: EngineSettings,
        exceptions: StrictMimetypeExceptions,
    ) -> Self {
        let spool_dir = TempDir::new().expect("Failed to create spool dir");
        let factory = Arc::new(MockChannelFactory::new());
        let lookup = Arc::new(MockMimetypeLookup::new());

        let env = fixtures::env_with(lookup.clone(), spool_dir.path(), settings, exceptions);
        let service = TransformService::new(env, factory.clone());
        let skipped = service.reload(specs);
        assert!(
            skipped.is_empty(),
            "unexpected skipped specs: {:?}",
            skipped
        );

        Self {
            service,
            factory,
            lookup,
            spool_dir,
        }
    }

    fn spool_files(&self) -> usize {
        std::fs::read_dir(self.spool_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn no_options() -> HashMap<String, String> {
    HashMap::new()
}

fn docx_to_jpeg_specs() -> Vec<TransformerSpec> {
    vec![
        fixtures::simple_spec("stepA", DOCX, PDF),
        fixtures::simple_spec("stepB", PDF, JPEG),
        TransformerSpec::pipeline(
            "docxToJpeg",
            vec![
                PipelineStep::new("stepA", Some(PDF)),
                PipelineStep::new("stepB", None),
            ],
        )
        .supports(SupportedTransform::new(DOCX, JPEG)),
    ]
}

#[tokio::test]
async fn test_pipeline_spools_one_intermediate() {
    let harness = TestHarness::new(docx_to_jpeg_specs());
    harness.factory.mock("stepA").set_output(b"%PDF-1.4 intermediate".to_vec());
    harness.factory.mock("stepB").set_output(vec![0xFF, 0xD8, 0xFF, 0xE0]);

    let reader = fixtures::reader_of_size(DOCX, 10 * 1024);
    let mut writer = MemoryContentWriter::new(JPEG);
    let mut ctx = harness.service.new_context();

    assert_ok!(
        harness
            .service
            .transform_traced(
                &mut ctx,
                &reader,
                &mut writer,
                &no_options(),
                Some("doclib"),
                Some("workspace://SpacesStore/1234"),
            )
            .await
    );

    assert_eq!(writer.mimetype(), JPEG);
    assert_eq!(writer.bytes(), &[0xFF, 0xD8, 0xFF, 0xE0]);

    // Exactly one intermediate, discarded once the second step read it
    assert_eq!(harness.service.spool().created(), 1);
    assert_eq!(harness.service.spool().outstanding(), 0);
    assert_eq!(harness.spool_files(), 0);

    let step_a = harness.factory.mock("stepA").sends();
    assert_eq!(step_a.len(), 1);
    assert_eq!(step_a[0].source_extension, "docx");
    assert_eq!(step_a[0].target_extension, "pdf");
    assert_eq!(step_a[0].content.len(), 10 * 1024);

    let step_b = harness.factory.mock("stepB").sends();
    assert_eq!(step_b.len(), 1);
    assert_eq!(step_b[0].source_mimetype, PDF);
    assert_eq!(step_b[0].target_extension, "jpg");
    assert_eq!(step_b[0].content, b"%PDF-1.4 intermediate");

    let records = ctx.records();
    let record_a = records
        .iter()
        .find(|r| r.transformer_name.as_deref() == Some("stepA"))
        .expect("stepA record");
    let record_b = records
        .iter()
        .find(|r| r.transformer_name.as_deref() == Some("stepB"))
        .expect("stepB record");
    assert_eq!(
        record_a.source_ref.as_deref(),
        Some("workspace://SpacesStore/1234")
    );
    assert_eq!(record_b.source_ref, None);
    assert!(record_a.reference.ends_with(".1.1"));
    assert!(record_b.reference.ends_with(".1.2"));
    assert_eq!(record_b.source_mimetype, PDF);

    let root = records.last().expect("root record");
    assert_eq!(root.depth, 1);
    assert_eq!(root.call_kind, CallKind::Both);
    assert_eq!(root.transformer_name.as_deref(), Some("docxToJpeg"));
    assert!(!root.failed());
}

#[tokio::test]
async fn test_pipeline_step_failure_releases_spool() {
    let harness = TestHarness::new(docx_to_jpeg_specs());
    harness.factory.mock("stepB").fail_sends_with("renderer crashed");

    let reader = fixtures::reader_of_size(DOCX, 512);
    let mut writer = MemoryContentWriter::new(JPEG);
    let result = harness
        .service
        .transform(&reader, &mut writer, &no_options(), None, None)
        .await;

    let err = assert_err!(result);
    assert!(!err.is_unsupported());
    assert_eq!(err.root_cause_message(), "HTTP 500: renderer crashed");
    assert!(!writer.is_written());
    assert_eq!(harness.service.spool().created(), 1);
    assert_eq!(harness.service.spool().outstanding(), 0);
    assert_eq!(harness.spool_files(), 0);
}

#[tokio::test]
async fn test_pipeline_trace_capture() {
    let harness = TestHarness::new(docx_to_jpeg_specs());
    let reader = fixtures::reader_of_size(DOCX, 2048);
    let mut writer = MemoryContentWriter::new(JPEG);
    let mut ctx = harness.service.new_context();
    ctx.trace_mut().start_capture();

    assert_ok!(
        harness
            .service
            .transform_traced(&mut ctx, &reader, &mut writer, &no_options(), None, None)
            .await
    );

    let captured = ctx.trace_mut().take_capture().expect("capture");
    assert!(captured.contains("docxToJpeg"));
    assert!(captured.contains("stepA"));
    assert!(captured.contains("1.2 pdf  jpg "));
    assert!(!captured.contains("Finished in"));
}

#[tokio::test]
async fn test_failover_exhaustion_keeps_last_cause() {
    let harness = TestHarness::new(vec![
        TransformerSpec::simple("one", "http://one"),
        TransformerSpec::simple("two", "http://two"),
        TransformerSpec::simple("three", "http://three"),
        TransformerSpec::failover("anyToPdf", vec!["one", "two", "three"])
            .supports(SupportedTransform::new(DOC, PDF)),
    ]);
    harness.factory.mock("one").fail_sends_with("first down");
    harness.factory.mock("two").fail_sends_with("second down");
    harness.factory.mock("three").fail_sends_with("third down");

    let reader = MemoryContentReader::new(b"doc body".to_vec(), DOC);
    let mut writer = MemoryContentWriter::new(PDF);
    let mut ctx = harness.service.new_context();
    let result = harness
        .service
        .transform_traced(&mut ctx, &reader, &mut writer, &no_options(), None, None)
        .await;

    let err = assert_err!(result);
    assert!(matches!(err, TransformError::ContentIo { .. }));
    assert_eq!(err.to_string(), "All 3 transformers failed");
    assert_eq!(err.root_cause_message(), "HTTP 500: third down");

    let failed_children: Vec<_> = ctx
        .records()
        .iter()
        .filter(|r| r.depth == 3 && r.failed())
        .collect();
    assert_eq!(failed_children.len(), 3);
    assert_eq!(
        failed_children
            .iter()
            .filter_map(|r| r.transformer_name.as_deref())
            .collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );

    // Every candidate read the whole source
    for name in ["one", "two", "three"] {
        let sends = harness.factory.mock(name).sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].content, b"doc body");
    }
}

#[tokio::test]
async fn test_failover_stops_at_first_success() {
    let harness = TestHarness::new(vec![
        TransformerSpec::simple("one", "http://one"),
        TransformerSpec::simple("two", "http://two"),
        TransformerSpec::simple("three", "http://three"),
        TransformerSpec::failover("anyToPdf", vec!["one", "two", "three"])
            .supports(SupportedTransform::new(DOC, PDF)),
    ]);
    harness.factory.mock("one").fail_sends_with("first down");
    harness.factory.mock("two").set_output(b"%PDF-1.7".to_vec());

    let reader = MemoryContentReader::new(b"doc body".to_vec(), DOC);
    let mut writer = MemoryContentWriter::new(PDF);
    assert_ok!(
        harness
            .service
            .transform(&reader, &mut writer, &no_options(), None, None)
            .await
    );

    assert_eq!(writer.bytes(), b"%PDF-1.7");
    assert_eq!(harness.factory.mock("three").send_count(), 0);
}

const UNKNOWN_INTERMEDIATE: &str = "application/x-unknown-intermediate";

fn failover_after_broken_pipeline_specs() -> Vec<TransformerSpec> {
    vec![
        fixtures::simple_spec("stepA", DOCX, UNKNOWN_INTERMEDIATE),
        fixtures::simple_spec("stepB", UNKNOWN_INTERMEDIATE, PDF),
        TransformerSpec::pipeline(
            "viaUnknown",
            vec![
                PipelineStep::new("stepA", Some(UNKNOWN_INTERMEDIATE)),
                PipelineStep::new("stepB", None),
            ],
        ),
        fixtures::simple_spec("direct", DOCX, PDF),
        TransformerSpec::failover("docxToPdf", vec!["viaUnknown", "direct"])
            .supports(SupportedTransform::new(DOCX, PDF).with_priority(10)),
    ]
}

#[tokio::test]
async fn test_failover_moves_past_unsupported_candidate() {
    let harness = TestHarness::new(failover_after_broken_pipeline_specs());
    harness.factory.mock("direct").set_output(b"%PDF-1.7".to_vec());

    let reader = MemoryContentReader::new(b"docx body".to_vec(), DOCX);
    let mut writer = MemoryContentWriter::new(PDF);
    assert_ok!(
        harness
            .service
            .transform(&reader, &mut writer, &no_options(), None, None)
            .await
    );

    assert_eq!(writer.bytes(), b"%PDF-1.7");
    assert_eq!(harness.factory.mock("stepA").send_count(), 0);
    assert_eq!(harness.factory.mock("direct").send_count(), 1);
    assert_eq!(
        harness.factory.mock("direct").sends()[0].content,
        b"docx body"
    );
}

#[tokio::test]
async fn test_failover_ending_on_unsupported_is_exhaustion() {
    let harness = TestHarness::new(failover_after_broken_pipeline_specs());
    harness.factory.mock("direct").fail_sends_with("direct down");

    let reader = MemoryContentReader::new(b"docx body".to_vec(), DOCX);
    let mut writer = MemoryContentWriter::new(PDF);
    let err = assert_err!(
        harness
            .service
            .transform(&reader, &mut writer, &no_options(), None, None)
            .await
    );

    assert!(matches!(err, TransformError::ContentIo { .. }));
    assert_eq!(err.to_string(), "All 2 transformers failed");
    assert_eq!(err.root_cause_message(), "HTTP 500: direct down");
}

fn mismatch_specs() -> Vec<TransformerSpec> {
    vec![
        fixtures::simple_spec("docToText", DOC, TEXT),
        fixtures::simple_spec("pdfToText", PDF, TEXT),
    ]
}

fn lenient() -> EngineSettings {
    EngineSettings {
        strict_mimetype_check: false,
        retry_transform_on_different_mimetype: true,
    }
}

#[tokio::test]
async fn test_mismatch_retry_uses_detected_mimetype() {
    let harness = TestHarness::with_settings(
        mismatch_specs(),
        lenient(),
        StrictMimetypeExceptions::default(),
    );
    harness.lookup.set_detected(DOC, PDF);
    harness.factory.mock("docToText").fail_sends_with("not a word document");
    harness.factory.mock("pdfToText").set_output(b"extracted".to_vec());

    let reader = MemoryContentReader::new(b"%PDF-1.4 really".to_vec(), DOC);
    let mut writer = MemoryContentWriter::new(TEXT);
    assert_ok!(
        harness
            .service
            .transform(&reader, &mut writer, &no_options(), None, None)
            .await
    );

    assert_eq!(writer.bytes(), b"extracted");
    let retried = harness.factory.mock("pdfToText").sends();
    assert_eq!(retried.len(), 1);
    assert_eq!(retried[0].source_mimetype, PDF);
    assert_eq!(retried[0].source_extension, "pdf");
    assert_eq!(harness.lookup.detect_count(), 1);
}

#[tokio::test]
async fn test_mismatch_retry_terminates() {
    let harness = TestHarness::with_settings(
        mismatch_specs(),
        lenient(),
        StrictMimetypeExceptions::default(),
    );
    harness.lookup.set_detected(DOC, PDF);
    harness.factory.mock("docToText").fail_sends_with("not a word document");
    harness.factory.mock("pdfToText").fail_sends_with("corrupt pdf");

    let reader = MemoryContentReader::new(b"garbage".to_vec(), DOC);
    let mut writer = MemoryContentWriter::new(TEXT);
    let result = harness
        .service
        .transform(&reader, &mut writer, &no_options(), None, None)
        .await;

    let err = assert_err!(result);
    assert!(!err.is_unsupported());
    assert_eq!(err.root_cause_message(), "HTTP 500: corrupt pdf");
    assert_eq!(harness.factory.mock("docToText").send_count(), 1);
    assert_eq!(harness.factory.mock("pdfToText").send_count(), 1);
    // Once for the original failure, once for the retry's failure
    assert_eq!(harness.lookup.detect_count(), 2);
}

#[tokio::test]
async fn test_mismatch_without_retry_reports_both_mimetypes() {
    let settings = EngineSettings {
        strict_mimetype_check: false,
        retry_transform_on_different_mimetype: false,
    };
    let harness = TestHarness::with_settings(
        mismatch_specs(),
        settings,
        StrictMimetypeExceptions::default(),
    );
    harness.lookup.set_detected(DOC, PDF);
    harness.factory.mock("docToText").fail_sends_with("not a word document");

    let reader = MemoryContentReader::new(b"garbage".to_vec(), DOC);
    let mut writer = MemoryContentWriter::new(TEXT);
    let result = harness
        .service
        .transform(&reader, &mut writer, &no_options(), None, None)
        .await;

    let err = assert_err!(result);
    let context = err.context().expect("context");
    assert_eq!(context.claimed_mimetype.as_deref(), Some(DOC));
    assert_eq!(context.detected_mimetype.as_deref(), Some(PDF));
    assert_eq!(harness.factory.mock("pdfToText").send_count(), 0);
}

fn pages_specs() -> Vec<TransformerSpec> {
    vec![fixtures::simple_spec("pagesToPdf", PAGES, PDF)]
}

#[tokio::test]
async fn test_strict_exception_allows_transform() {
    let harness = TestHarness::new(pages_specs());
    harness.lookup.set_detected(PAGES, ZIP);

    let reader = MemoryContentReader::new(b"PK\x03\x04pages".to_vec(), PAGES);
    let mut writer = MemoryContentWriter::new(PDF);
    assert_ok!(
        harness
            .service
            .transform(&reader, &mut writer, &no_options(), None, None)
            .await
    );
    assert_eq!(harness.factory.mock("pagesToPdf").send_count(), 1);
}

#[tokio::test]
async fn test_strict_mismatch_refused_before_any_send() {
    let harness = TestHarness::with_settings(
        pages_specs(),
        EngineSettings::default(),
        StrictMimetypeExceptions::empty(),
    );
    harness.lookup.set_detected(PAGES, ZIP);

    let reader = MemoryContentReader::new(b"PK\x03\x04pages".to_vec(), PAGES);
    let mut writer = MemoryContentWriter::new(PDF);
    let result = harness
        .service
        .transform(&reader, &mut writer, &no_options(), None, None)
        .await;

    let err = assert_err!(result);
    assert!(err.is_unsupported());
    assert_eq!(harness.factory.total_sends(), 0);
    assert!(!writer.is_written());
}

#[tokio::test]
async fn test_pass_through_is_idempotent() {
    let harness = TestHarness::new(vec![TransformerSpec::pass_through()
        .supports(SupportedTransform::new(PDF, PDF))
        .supports(SupportedTransform::new(TEXT, TEXT))]);

    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let reader = MemoryContentReader::new(bytes.clone(), PDF);
    let mut writer = MemoryContentWriter::new(PDF);
    assert_ok!(
        harness
            .service
            .transform(&reader, &mut writer, &no_options(), None, None)
            .await
    );
    assert_eq!(writer.bytes(), bytes.as_slice());

    let empty = MemoryContentReader::new(Vec::new(), TEXT);
    let mut writer = MemoryContentWriter::new(TEXT);
    assert_ok!(
        harness
            .service
            .transform(&empty, &mut writer, &no_options(), None, None)
            .await
    );
    assert!(writer.is_written());
    assert!(writer.bytes().is_empty());
    assert!(harness.factory.created_channels().is_empty());
}

#[tokio::test]
async fn test_options_are_filtered_before_send() {
    let harness = TestHarness::new(vec![fixtures::simple_spec("resizer", PDF, JPEG)
        .with_options(&["width", "height"])]);

    let mut options = HashMap::new();
    options.insert("width".to_string(), "320".to_string());
    options.insert("height".to_string(), "200".to_string());
    options.insert("watermark".to_string(), "draft".to_string());
    options.insert("timeout".to_string(), "5000".to_string());

    let reader = MemoryContentReader::new(b"%PDF".to_vec(), PDF);
    let mut writer = MemoryContentWriter::new(JPEG);
    assert_ok!(
        harness
            .service
            .transform(&reader, &mut writer, &options, None, None)
            .await
    );

    let sends = harness.factory.mock("resizer").sends();
    assert_eq!(
        sends[0].args,
        vec![
            ("height".to_string(), "200".to_string()),
            ("width".to_string(), "320".to_string()),
        ]
    );
    assert_eq!(sends[0].timeout_ms, Some(5000));
}

#[tokio::test]
async fn test_no_transformer_is_unsupported() {
    let harness = TestHarness::new(pages_specs());
    let reader = MemoryContentReader::new(b"x".to_vec(), DOC);
    let mut writer = MemoryContentWriter::new(JPEG);
    let mut ctx = harness.service.new_context();

    let result = harness
        .service
        .transform_traced(&mut ctx, &reader, &mut writer, &no_options(), None, None)
        .await;

    let err = assert_err!(result);
    assert!(err.is_unsupported());
    let root = ctx.records().last().expect("root record");
    assert_eq!(root.call_kind, CallKind::AvailabilityOnly);
    assert_eq!(root.failure.as_deref(), Some(NO_TRANSFORMERS));
}

#[tokio::test]
async fn test_pipeline_with_one_step_is_rejected_at_registration() {
    let harness = TestHarness::new(vec![fixtures::simple_spec("stepA", DOCX, PDF)]);
    let skipped = harness.service.reload(vec![
        fixtures::simple_spec("stepA", DOCX, PDF),
        TransformerSpec::pipeline("tooShort", vec![PipelineStep::new("stepA", None)])
            .supports(SupportedTransform::new(DOCX, PDF)),
    ]);

    assert_eq!(
        skipped,
        vec![RegistryError::TooFewSteps {
            name: "tooShort".to_string(),
            count: 1,
        }]
    );
    assert!(harness.service.snapshot().transformer("tooShort").is_none());
    assert!(harness.service.snapshot().transformer("stepA").is_some());
}
