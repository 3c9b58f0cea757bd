//! Integration tests for document generation
//! Tests template expansion, rebinding, font resolution, remote requests,
//! file parsing and PDF output through the public document API.

use components::{
    BindableText, ComponentBuilder, ComponentEvent, Document, EventArgs, EventHandler, GenerationError,
    GenerationOptions, GenerationStage, NodeId, Result, Template, TemplateSpec, TraceLevel,
};
use data_binding::{BindingPath, ConformanceMode, InlineDataSource};
use fonts::{Font, FontDefinition, FontRegistry, FontStyle, FontWeight, MatchOutcome, StandardFont};
use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::fs;
use std::rc::Rc;

/// Route generation logs to the test output; filter with `RUST_LOG`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn current_item() -> ComponentBuilder {
    ComponentBuilder::text(BindableText::parse("{{ . }}").unwrap())
}

fn rows_template() -> ComponentBuilder {
    ComponentBuilder::template(TemplateSpec::repeating(current_item()).with_data_source("rows"))
}

/// Texts of the page's children, with `None` for components without text
fn child_texts(doc: &Document, page: NodeId) -> Vec<Option<String>> {
    doc.tree()
        .children(page)
        .iter()
        .map(|&child| doc.component(child).unwrap().text().map(str::to_string))
        .collect()
}

fn page_of_rows(doc: &mut Document, values: Vec<i32>) -> NodeId {
    doc.add_data_source(InlineDataSource::new("rows", values));
    doc.add_page(
        ComponentBuilder::page()
            .child(ComponentBuilder::label("before"))
            .child(rows_template())
            .child(ComponentBuilder::label("after")),
    )
    .unwrap()
}

// =============================================================================
// Templates
// =============================================================================

#[test]
fn test_template_items_are_inserted_before_the_template() {
    let mut doc = Document::new();
    let page = page_of_rows(&mut doc, vec![1, 2, 3]);
    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();

    assert_eq!(
        child_texts(&doc, page),
        vec![
            Some("before".to_string()),
            Some("1".to_string()),
            Some("2".to_string()),
            Some("3".to_string()),
            None,
            Some("after".to_string()),
        ]
    );
}

#[test]
fn test_template_items_may_share_an_explicit_id() {
    let mut doc = Document::new();
    doc.add_data_source(InlineDataSource::new("rows", vec![1, 2, 3]));
    let page = doc
        .add_page(ComponentBuilder::page().child(ComponentBuilder::template(
            TemplateSpec::repeating(current_item().with_id("row")).with_data_source("rows"),
        )))
        .unwrap();
    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();
    doc.data_bind().unwrap();

    let texts = child_texts(&doc, page);
    assert_eq!(
        texts,
        vec![Some("1".to_string()), Some("2".to_string()), Some("3".to_string()), None]
    );
    let last = doc.tree().children(page)[2];
    assert_eq!(doc.tree().find_by_id("row"), Some(last));
}

#[test]
fn test_skipped_item_leaves_inserted_components_contiguous() {
    let item = Rc::new(Template::from(current_item()));
    let source = move |index: usize, _inserted: usize| if index == 1 { None } else { Some(Rc::clone(&item)) };

    let mut doc = Document::new();
    doc.add_data_source(InlineDataSource::new("rows", vec![10, 20, 30]));
    let page = doc
        .add_page(
            ComponentBuilder::page()
                .child(ComponentBuilder::label("before"))
                .child(ComponentBuilder::template(TemplateSpec::new(source).with_data_source("rows")))
                .child(ComponentBuilder::label("after")),
        )
        .unwrap();
    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();

    let texts = child_texts(&doc, page);
    assert_eq!(texts.len(), 5);
    assert_eq!(texts[1].as_deref(), Some("10"));
    assert_eq!(texts[2].as_deref(), Some("30"));
    assert_eq!(texts[3], None);
}

#[test]
fn test_empty_data_stack_binds_one_iteration() {
    let mut doc = Document::new();
    let page = doc
        .add_page(
            ComponentBuilder::page()
                .child(ComponentBuilder::template(TemplateSpec::repeating(ComponentBuilder::label("once")))),
        )
        .unwrap();
    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();

    assert_eq!(child_texts(&doc, page), vec![Some("once".to_string()), None]);
}

#[test]
fn test_selector_narrows_the_data_source() {
    let mut doc = Document::new();
    doc.add_data_source(InlineDataSource::new(
        "orders",
        serde_json::json!({ "lines": ["pen", "ink"], "total": 2 }),
    ));
    let template = TemplateSpec::repeating(current_item())
        .with_data_source("orders")
        .with_selector(BindingPath::parse("lines").unwrap());
    let page = doc
        .add_page(ComponentBuilder::page().child(ComponentBuilder::template(template)))
        .unwrap();
    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();

    assert_eq!(
        child_texts(&doc, page),
        vec![Some("pen".to_string()), Some("ink".to_string()), None]
    );
}

#[test]
fn test_cursor_is_restored_when_an_item_fails() {
    init_tracing();
    let created = Rc::new(Cell::new(0));
    let failing_init: EventHandler = {
        let created = Rc::clone(&created);
        Rc::new(move |_args: &mut EventArgs<'_>| -> Result<()> {
            created.set(created.get() + 1);
            if created.get() == 2 {
                return Err(GenerationError::Reference("second item is broken".into()));
            }
            Ok(())
        })
    };
    let seen = Rc::new(RefCell::new(None));
    let observe: EventHandler = {
        let seen = Rc::clone(&seen);
        Rc::new(move |args: &mut EventArgs<'_>| -> Result<()> {
            if let Some(context) = args.context {
                *seen.borrow_mut() = Some((context.current_index(), context.current_key().map(str::to_string)));
            }
            Ok(())
        })
    };

    let mut doc = Document::new();
    doc.add_data_source(InlineDataSource::new("rows", vec![1, 2, 3]));
    let page = doc
        .add_page(
            ComponentBuilder::page()
                .child(ComponentBuilder::template(
                    TemplateSpec::repeating(current_item().on(ComponentEvent::Init, failing_init))
                        .with_data_source("rows"),
                ))
                .child(ComponentBuilder::label("after").on(ComponentEvent::DataBinding, observe)),
        )
        .unwrap();
    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();

    assert_eq!(*seen.borrow(), Some((0, None)));
    // The first item stays; the failed one was discarded
    assert_eq!(child_texts(&doc, page)[0].as_deref(), Some("1"));
    assert_eq!(doc.tree().children(page).len(), 3);
    assert!(doc.trace().entries_at(TraceLevel::Error).any(|e| e.category == "Binding"));
}

#[test]
fn test_strict_item_failure_is_a_data_error() {
    let failing: EventHandler =
        Rc::new(|_args: &mut EventArgs<'_>| -> Result<()> { Err(GenerationError::Reference("bad item".into())) });
    let mut options = GenerationOptions::default();
    options.conformance = ConformanceMode::Strict;

    let mut doc = Document::with_options(options);
    doc.add_data_source(InlineDataSource::new("rows", vec![1]));
    doc.add_page(
        ComponentBuilder::page().child(ComponentBuilder::template(
            TemplateSpec::repeating(current_item().on(ComponentEvent::DataBinding, failing)).with_data_source("rows"),
        )),
    )
    .unwrap();
    doc.initialize_and_load().unwrap();

    assert!(matches!(doc.data_bind(), Err(GenerationError::Data { .. })));
}

proptest! {
    #[test]
    fn rebinding_replaces_previous_items(values in prop::collection::vec(any::<i32>(), 1..8)) {
        let mut doc = Document::new();
        let page = page_of_rows(&mut doc, values.clone());
        doc.initialize_and_load().unwrap();

        doc.data_bind().unwrap();
        let first = child_texts(&doc, page);
        doc.data_bind().unwrap();
        let second = child_texts(&doc, page);

        prop_assert_eq!(doc.stage(), GenerationStage::Bound);
        prop_assert_eq!(first.len(), values.len() + 3);
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Stages
// =============================================================================

#[test]
fn test_stages_must_run_in_order() {
    let mut doc = Document::new();
    assert!(matches!(doc.layout(), Err(GenerationError::Stage(_))));
    assert!(matches!(doc.load(), Err(GenerationError::Stage(_))));

    doc.init().unwrap();
    assert!(matches!(doc.init(), Err(GenerationError::Stage(_))));
    doc.load().unwrap();

    let layout = doc.layout().unwrap();
    assert_eq!(doc.stage(), GenerationStage::Laidout);
    assert!(matches!(doc.data_bind(), Err(GenerationError::Stage(_))));

    doc.write_pdf(layout, Vec::new()).unwrap();
    doc.dispose().unwrap();
    let err = doc.init().unwrap_err();
    assert!(err.to_string().contains("has been disposed"));
}

#[test]
fn test_layout_auto_binds_a_loaded_document() {
    let mut doc = Document::new();
    let page = page_of_rows(&mut doc, vec![5]);
    doc.initialize_and_load().unwrap();
    doc.layout().unwrap();

    assert_eq!(child_texts(&doc, page)[1].as_deref(), Some("5"));
}

// =============================================================================
// Fonts
// =============================================================================

#[test]
fn test_font_resolution_is_deterministic() {
    let mut doc = Document::new();
    let mut first = Font::parse("Times,Bold").unwrap();
    let mut second = Font::parse("Times,Bold").unwrap();

    let a = doc.resolve_font(&mut first, true).unwrap();
    let b = doc.resolve_font(&mut second, true).unwrap();

    assert_eq!(a.outcome, MatchOutcome::Exact);
    assert!(Rc::ptr_eq(&a.resource, &b.resource));
    assert_eq!(doc.resources().fonts().len(), 1);
}

#[test]
fn test_missing_style_is_substituted_with_a_warning() {
    let factory = FontRegistry::new().with(FontDefinition::standard(StandardFont::Helvetica));
    let mut doc = Document::new().with_font_factory(factory);

    let mut request = Font::parse("Helvetica,Bold,Italic").unwrap();
    let matched = doc.resolve_font(&mut request, true).unwrap();

    assert!(matches!(matched.outcome, MatchOutcome::Substituted { .. }));
    assert_eq!(matched.resource.definition().base_font(), "Helvetica");
    assert!(doc
        .trace()
        .entries_at(TraceLevel::Warning)
        .any(|e| e.category == "Fonts"));
}

#[test]
fn test_unknown_family_without_substitution_falls_back_to_courier() {
    let mut options = GenerationOptions::default();
    options.font_substitution = false;
    let mut doc = Document::with_options(options);

    let mut request = Font::parse("Nonexistent,Bold,Italic").unwrap();
    let matched = doc.resolve_font(&mut request, true).unwrap();

    assert_eq!(matched.outcome, MatchOutcome::Fallback);
    assert_eq!(
        matched.resource.definition().standard_font(),
        Some(StandardFont::CourierBoldOblique)
    );
    assert!(doc
        .trace()
        .entries_at(TraceLevel::Error)
        .any(|e| e.category == "Fonts"));
}

#[test]
fn test_repeated_courier_fallback_is_logged_as_an_error() {
    let mut doc = Document::new();

    for _ in 0..2 {
        let mut request = Font::parse("Nope,Bold").unwrap();
        let matched = doc.resolve_font(&mut request, true).unwrap();
        assert_eq!(matched.outcome, MatchOutcome::Fallback);
    }

    assert_eq!(doc.trace().entries_at(TraceLevel::Error).filter(|e| e.category == "Fonts").count(), 2);
    assert_eq!(doc.trace().entries_at(TraceLevel::Warning).filter(|e| e.category == "Fonts").count(), 0);
}

#[test]
fn test_equal_proximity_keeps_the_first_candidate() {
    let factory = FontRegistry::new()
        .with(FontDefinition::custom("Acme", FontWeight::LIGHT, FontStyle::Regular))
        .with(FontDefinition::custom("Acme", FontWeight::MEDIUM, FontStyle::Regular));
    let mut doc = Document::new().with_font_factory(factory);

    let mut request = Font::parse("Acme").unwrap();
    let matched = doc.resolve_font(&mut request, true).unwrap();

    assert_eq!(matched.outcome, MatchOutcome::Substituted { proximity: Some(100) });
    assert_eq!(matched.resource.definition().weight(), FontWeight::LIGHT);
}

// =============================================================================
// Remote requests
// =============================================================================

#[test]
fn test_remote_attachment_is_stored_when_completed() {
    let mut doc = Document::new();
    doc.add_page(
        ComponentBuilder::page()
            .child(ComponentBuilder::attachment(BindableText::literal("https://example.com/notes.txt"))),
    )
    .unwrap();
    doc.initialize_and_load().unwrap();

    let pending: Vec<_> = doc.remote_requests().pending().map(|(id, _)| id).collect();
    assert_eq!(pending.len(), 1);
    assert!(doc.resources().attachment("https://example.com/notes.txt").is_none());

    assert!(doc
        .complete_remote_request(pending[0], Ok(Rc::new(b"remote notes".to_vec())))
        .unwrap());
    assert!(!doc
        .complete_remote_request(pending[0], Ok(Rc::new(Vec::new())))
        .unwrap());

    let attachment = doc.resources().attachment("https://example.com/notes.txt").unwrap();
    assert_eq!(attachment.data().file_name(), "notes.txt");
    doc.layout().unwrap();
}

#[test]
fn test_unfulfilled_remote_request_blocks_strict_layout() {
    let mut options = GenerationOptions::default();
    options.conformance = ConformanceMode::Strict;
    let mut doc = Document::with_options(options);
    doc.add_page(
        ComponentBuilder::page()
            .child(ComponentBuilder::attachment(BindableText::literal("https://example.com/a.txt"))),
    )
    .unwrap();
    doc.initialize_and_load().unwrap();

    assert!(matches!(doc.layout(), Err(GenerationError::Reference(_))));
}

// =============================================================================
// Files
// =============================================================================

#[test]
fn test_open_resolves_includes_and_instructions() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("parts")).unwrap();
    fs::write(dir.path().join("customers.json"), r#"["Ada", "Grace"]"#).unwrap();
    fs::write(
        dir.path().join("parts/page.json"),
        r#"{ "type": "page", "name": "body", "children": [ { "type": "label", "text": "From include" } ] }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("main.json"),
        r#"<?docgen parser-mode="strict" log-level="debug" ?>
        {
            "info": { "title": "Customers" },
            "dataSources": [ { "type": "json", "id": "customers", "path": "customers.json" } ],
            "pages": [
                { "type": "include", "path": "parts/page.json" },
                { "type": "page", "children": [
                    { "type": "template", "dataSource": "customers",
                      "items": [ { "type": "label", "text": "{{ . }}" } ] }
                ] }
            ]
        }"#,
    )
    .unwrap();

    let mut doc = Document::open(dir.path().join("main.json"), GenerationOptions::default()).unwrap();
    assert_eq!(doc.conformance(), ConformanceMode::Strict);
    assert_eq!(doc.options().trace_level, TraceLevel::Debug);
    assert_eq!(doc.info().title_text(), Some("Customers"));

    let body = doc.find_by_name("body").unwrap();
    assert_eq!(body.loaded_source(), Some(dir.path().join("parts/page.json").as_path()));

    doc.initialize_and_load().unwrap();
    doc.data_bind().unwrap();
    let pages = doc.tree().children(doc.root()).to_vec();
    assert_eq!(pages.len(), 2);
    assert_eq!(
        child_texts(&doc, pages[1]),
        vec![Some("Ada".to_string()), Some("Grace".to_string()), None]
    );
}

#[test]
fn test_circular_include_fails_in_any_mode() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a.json"),
        r#"{ "pages": [ { "type": "include", "path": "b.json" } ] }"#,
    )
    .unwrap();
    fs::write(dir.path().join("b.json"), r#"{ "type": "include", "path": "a.json" }"#).unwrap();

    let lax = Document::open(dir.path().join("a.json"), GenerationOptions::default());
    assert!(matches!(lax, Err(GenerationError::Structural(_))));
}

#[test]
fn test_missing_include_by_conformance() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("main.json"),
        r#"{ "pages": [ { "type": "page" }, { "type": "include", "path": "gone.json" } ] }"#,
    )
    .unwrap();

    let lax = Document::open(dir.path().join("main.json"), GenerationOptions::default()).unwrap();
    assert_eq!(lax.tree().children(lax.root()).len(), 1);

    let mut options = GenerationOptions::default();
    options.conformance = ConformanceMode::Strict;
    let strict = Document::open(dir.path().join("main.json"), options);
    assert!(matches!(strict, Err(GenerationError::Reference(_))));
}

#[test]
fn test_save_as_pdf_writes_a_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.pdf");

    let mut doc = Document::new();
    doc.info_mut().set_title(BindableText::literal("Invoice"));
    page_of_rows(&mut doc, vec![1, 2]);
    doc.save_as_pdf(&path, true).unwrap();

    let bytes = fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.7"));
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Title (Invoice)"));
    assert!(text.trim_end().ends_with("%%EOF"));
    assert_eq!(doc.stage(), GenerationStage::Written);
}

#[test]
fn test_trace_log_appendix_adds_pages() {
    let mut options = GenerationOptions::default();
    options.append_trace_log = true;
    options.trace_level = TraceLevel::Debug;
    options.compress_streams = false;

    let mut doc = Document::with_options(options);
    doc.add_page(ComponentBuilder::page().child(ComponentBuilder::label("Body")))
        .unwrap();
    let bytes = doc.save_as_pdf_to(Vec::new(), true).unwrap();

    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("(Generation log)"));
    assert!(text.contains("/Count 2"));
}
