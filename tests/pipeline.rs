//! Conversion flows against the in-process browser and uploader.

mod common;

use common::{entries, mock_config, MockBrowser, MockUploader, StageRecorder, ToolState};
use remarkdown::{
    convert_and_upload, convert_to_bytes, convert_to_file, ConversionConfig, ConversionRequest, ErrorCategory,
    PaginatorStage, RemarkdownError,
};
use std::sync::Arc;

const SAMPLE: &str = "# Notes\n\nSome text.\n\n```python\nprint(1)\n```\n";

#[tokio::test]
async fn empty_markdown_launches_no_browser() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(800.0);
    let uploader = MockUploader::new(ToolState::Ready);
    let config = mock_config(work.path(), browser.clone(), uploader.clone());

    let request = ConversionRequest::new("   \n\n", "empty");
    let err = convert_to_bytes(&request, &config).await.unwrap_err();
    assert!(matches!(err, RemarkdownError::EmptyMarkdown));
    assert_eq!(err.category(), ErrorCategory::Input);

    let err = convert_and_upload(&request, None, &config).await.unwrap_err();
    assert!(matches!(err, RemarkdownError::EmptyMarkdown));

    assert_eq!(browser.launch_count(), 0);
    assert!(uploader.uploads().is_empty());
    assert_eq!(entries(work.path()), 0);
}

#[tokio::test]
async fn pdf_bytes_are_one_page_as_tall_as_the_body() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(1234.4);
    let config = mock_config(work.path(), browser.clone(), MockUploader::new(ToolState::Ready));

    let pdf = convert_to_bytes(&ConversionRequest::new(SAMPLE, "My notes"), &config)
        .await
        .unwrap();

    // 1235px of content plus 20 mm of vertical margins.
    assert_eq!(pdf.height_px, 1312);
    assert!(pdf.bytes.starts_with(b"%PDF"));
    assert!(pdf.filename.starts_with("My-notes-"), "got {}", pdf.filename);
    assert!(pdf.filename.ends_with(".pdf"));
    assert!(!pdf.filename.contains(':'));
    assert_eq!(pdf.stats.pdf_bytes, pdf.bytes.len() as u64);
    assert_eq!(browser.launch_count(), 1);
    assert_eq!(entries(work.path()), 0, "temp dir must be removed");
}

#[tokio::test]
async fn styles_are_reapplied_before_measuring() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(500.0);
    let recorder = Arc::new(StageRecorder::default());
    let config = ConversionConfig::builder()
        .work_dir(work.path())
        .settle_delay_ms(0)
        .browser(browser.clone())
        .uploader(MockUploader::new(ToolState::Ready))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert_to_bytes(&ConversionRequest::new(SAMPLE, "x"), &config)
        .await
        .unwrap();

    let calls = browser.calls();
    let pos = |name: &str| calls.iter().position(|c| c.starts_with(name)).unwrap();
    assert!(pos("emulate_print") < pos("measure"));
    assert!(pos("inject_style") < pos("measure"));
    assert!(pos("measure") < pos("print"));
    assert_eq!(calls.last().map(String::as_str), Some("close"));

    let stages = recorder.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            PaginatorStage::BrowserLaunching,
            PaginatorStage::PageLoaded,
            PaginatorStage::StylesReapplied,
            PaginatorStage::HeightMeasured,
            PaginatorStage::PdfWritten,
            PaginatorStage::BrowserClosed,
        ]
    );
}

#[tokio::test]
async fn unauthenticated_tool_fails_fast_and_leaves_nothing_behind() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(500.0);
    let uploader = MockUploader::new(ToolState::NotAuthenticated);
    let recorder = Arc::new(StageRecorder::default());
    let config = ConversionConfig::builder()
        .work_dir(work.path())
        .settle_delay_ms(0)
        .browser(browser.clone())
        .uploader(uploader.clone())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let err = convert_and_upload(&ConversionRequest::new(SAMPLE, "x"), None, &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RemarkdownError::ToolNotAuthenticated { .. }));
    assert_eq!(err.category(), ErrorCategory::ExternalTool);
    assert!(err.instructions().unwrap().contains("rmapi"));
    assert_eq!(browser.launch_count(), 0);
    assert_eq!(entries(work.path()), 0);
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn rejected_upload_still_removes_the_temp_pdf() {
    let work = tempfile::tempdir().unwrap();
    let browser = MockBrowser::new(640.0);
    let uploader = MockUploader::rejecting();
    let config = mock_config(work.path(), browser.clone(), uploader.clone());

    let err = convert_and_upload(&ConversionRequest::new(SAMPLE, "x"), Some("/Notes"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RemarkdownError::UploadRejected { .. }));
    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].existed, "the PDF must exist while it is uploaded");
    assert!(!uploads[0].path.exists());
    assert_eq!(entries(work.path()), 0);
    assert_eq!(browser.calls().last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn upload_uses_default_folder_and_reports_the_file_name() {
    let work = tempfile::tempdir().unwrap();
    let uploader = MockUploader::new(ToolState::Ready);
    let config = mock_config(work.path(), MockBrowser::new(900.0), uploader.clone());

    let receipt = convert_and_upload(&ConversionRequest::new(SAMPLE, ""), None, &config)
        .await
        .unwrap();

    assert_eq!(receipt.folder, "/LLM-Outputs");
    assert!(receipt.filename.starts_with("llm-output-"));
    assert_eq!(
        receipt.message,
        format!("Successfully uploaded \"{}\" to reMarkable folder \"/LLM-Outputs\"", receipt.filename)
    );
    assert_eq!(*uploader.folders_created.lock().unwrap(), vec!["/LLM-Outputs".to_string()]);

    let uploads = uploader.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].existed);
    assert!(uploads[0].size > 0);
    assert_eq!(
        uploads[0].path.file_name().unwrap().to_string_lossy(),
        receipt.filename
    );
    assert_eq!(entries(work.path()), 0);
}

#[tokio::test]
async fn concurrent_conversions_do_not_share_temp_paths() {
    let work = tempfile::tempdir().unwrap();
    let uploader = MockUploader::new(ToolState::Ready);
    let config = mock_config(work.path(), MockBrowser::new(300.0), uploader.clone());
    let request = ConversionRequest::new(SAMPLE, "same-name");

    let (a, b, c) = tokio::join!(
        convert_and_upload(&request, None, &config),
        convert_and_upload(&request, None, &config),
        convert_and_upload(&request, None, &config),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let mut paths: Vec<_> = uploader.uploads().into_iter().map(|u| u.path).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 3);
    assert_eq!(entries(work.path()), 0);
}

#[tokio::test]
async fn browser_launch_failure_is_a_browser_error() {
    let work = tempfile::tempdir().unwrap();
    let config = mock_config(work.path(), MockBrowser::failing(), MockUploader::new(ToolState::Ready));

    let err = convert_to_bytes(&ConversionRequest::new(SAMPLE, "x"), &config)
        .await
        .unwrap_err();

    assert!(matches!(err, RemarkdownError::BrowserLaunchFailed { .. }));
    assert_eq!(err.category(), ErrorCategory::Browser);
    assert_eq!(entries(work.path()), 0);
}

#[tokio::test]
async fn convert_to_file_creates_parents_and_refuses_overwrite() {
    let work = tempfile::tempdir().unwrap();
    let out = work.path().join("nested/dir/doc.pdf");
    let config = mock_config(work.path(), MockBrowser::new(100.0), MockUploader::new(ToolState::Ready));
    let request = ConversionRequest::new(SAMPLE, "doc");

    let artifact = convert_to_file(&request, &out, &config).await.unwrap();
    assert_eq!(artifact.path, out);
    assert_eq!(artifact.content_height_px, 100);
    assert!(artifact.height_px > 100);
    assert!(out.exists());

    let err = convert_to_file(&request, &out, &config).await.unwrap_err();
    assert!(matches!(err, RemarkdownError::OutputExists { .. }));
}
