// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end builds through the public entry points

use pretty_assertions::assert_eq;
use reportrix_core::{
    AssetStore, Block, BuildError, Document, Figure, LeafBuilder, LeafTag, Payload, RenderMode,
    TableData,
};
use reportrix_pipeline::{
    build_report, extract_report_data, prepare_upload, save_report, Artifact, BuildState,
    ConvertToMarkup, ExportString, PageTemplate, Pipeline, PipelineError, PreProcess, ReportConfig,
    StructuralRewrite,
};
use std::sync::Arc;
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn table_2x2() -> TableData {
    TableData::new(vec!["x".into(), "y".into()])
        .with_row(vec![1i64.into(), 2i64.into()])
        .with_row(vec![3i64.into(), 4i64.into()])
}

fn svg(label: &str) -> Block {
    Block::plot(Payload::Figure(Arc::new(Figure::svg(format!(
        "<svg><text>{label}</text></svg>"
    )))))
}

fn report() -> Document {
    Document::new(vec![
        Block::page(
            "Summary",
            vec![
                Block::text("Quarterly numbers"),
                Block::big_number("Revenue", "1.2M").unwrap(),
                svg("A"),
            ],
        ),
        Block::page(
            "Detail",
            vec![Block::group(vec![Block::table(table_2x2()), svg("B")]), svg("C")],
        ),
    ])
}

fn to_string(document: Document, store: AssetStore) -> Result<String, PipelineError> {
    let exported = Pipeline::new(BuildState::new(document, store))
        .pipe(PreProcess::finalized())?
        .pipe(StructuralRewrite)?
        .pipe(ConvertToMarkup::new(RenderMode::Embedded))?
        .pipe(ExportString::new(PageTemplate::default()))?
        .finish();
    match exported.artifact {
        Artifact::Html(html) => Ok(html),
        other => panic!("expected an HTML artifact, got {other:?}"),
    }
}

#[test]
fn test_group_with_text_and_table() {
    init_logging();
    let html = to_string(
        Document::new(vec![Block::group(vec![
            Block::text("hello"),
            Block::table(table_2x2()),
        ])]),
        AssetStore::in_memory(),
    )
    .unwrap();
    let data = extract_report_data(&html).unwrap();
    assert_eq!(data.assets.len(), 1);
    let (hash, entry) = data.assets.get_index(0).unwrap();
    assert_eq!(hash.len(), 10);
    assert!(data.view_xml.contains("<Group columns=\"1\"><Text>hello</Text><Table "));
    assert!(data.view_xml.contains(&format!("src=\"ref://{hash}\"")));
    assert!(entry.reference.starts_with("data:"));
}

#[test]
fn test_assets_follow_document_order() {
    init_logging();
    let html = to_string(report(), AssetStore::in_memory()).unwrap();
    let data = extract_report_data(&html).unwrap();
    let positions: Vec<usize> = data
        .assets
        .keys()
        .map(|hash| data.view_xml.find(&format!("ref://{hash}")).unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
    assert_eq!(data.assets.len(), 4);
}

#[test]
fn test_duplicate_names_fail_conversion() {
    init_logging();
    let named = |body: &str| {
        LeafBuilder::new(LeafTag::Text)
            .name("dup")
            .content(body)
            .build()
            .unwrap()
    };
    let err = to_string(
        Document::new(vec![named("one"), Block::group(vec![named("two")])]),
        AssetStore::in_memory(),
    )
    .unwrap_err();
    match err {
        PipelineError::Build(BuildError::StructuralError { message, .. }) => {
            assert!(message.contains("dup"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_single_child_select_rejected() {
    init_logging();
    let err = to_string(
        Document::new(vec![Block::select(vec![Block::text("lonely")])]),
        AssetStore::in_memory(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Build(BuildError::StructuralError { .. })
    ));
}

#[test]
fn test_cloned_documents_build_identically() {
    init_logging();
    let document = report();
    let first = extract_report_data(&to_string(document.clone(), AssetStore::in_memory()).unwrap()).unwrap();
    let second = extract_report_data(&to_string(document, AssetStore::in_memory()).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_store_variants_agree_on_hashes_and_sizes() {
    init_logging();
    let inline = extract_report_data(&to_string(report(), AssetStore::in_memory()).unwrap()).unwrap();
    let spooled = extract_report_data(&to_string(report(), AssetStore::temp_gzip()).unwrap()).unwrap();
    let summary = |data: &reportrix_pipeline::ReportData| {
        data.assets
            .iter()
            .map(|(hash, entry)| (hash.clone(), entry.mime.clone(), entry.size))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&inline), summary(&spooled));
    assert_eq!(inline.view_xml, spooled.view_xml);
}

#[test]
fn test_discard_store_converts_but_never_exports() {
    init_logging();
    let err = to_string(report(), AssetStore::discard()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidConfig(_)));
}

#[test]
fn test_save_then_build_directory() {
    init_logging();
    let dir = tempdir().unwrap();
    let config = ReportConfig::default();

    let file = dir.path().join("report.html");
    save_report(report(), &file, &config).unwrap();
    let inline = extract_report_data(&std::fs::read_to_string(&file).unwrap()).unwrap();

    let site = dir.path().join("site");
    build_report(report(), &site, &config).unwrap();
    let served = extract_report_data(&std::fs::read_to_string(site.join("index.html")).unwrap()).unwrap();

    assert_eq!(
        inline.assets.keys().collect::<Vec<_>>(),
        served.assets.keys().collect::<Vec<_>>()
    );
    for (hash, entry) in &served.assets {
        assert_eq!(entry.reference, format!("assets/{hash}{}", extension(&entry.mime)));
        let bytes = std::fs::read(site.join(&entry.reference)).unwrap();
        assert_eq!(bytes.len() as u64, entry.size);
    }
}

fn extension(mime: &str) -> &'static str {
    match mime {
        "image/svg+xml" => ".svg",
        _ => ".tbl.html",
    }
}

#[test]
fn test_upload_bundle_matches_store_order() {
    init_logging();
    let bundle = prepare_upload(report(), &ReportConfig::default()).unwrap();
    assert_eq!(bundle.attachments.len(), 4);
    for index in 0..bundle.attachments.len() {
        assert!(bundle.view_xml.contains(&format!("attachment://{index}")));
    }
    assert!(!bundle.view_xml.contains("ref://"));
}
