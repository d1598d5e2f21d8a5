//! WASM browser tests for marginalia-browser.
//!
//! Run with: `wasm-pack test --headless --firefox` or `--chrome`

use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

use marginalia_browser::{
    AnnotationId, AnnotationSet, AnnotationStore, BrowserDom, DomRange, DomTree, HighlightDom,
    LocalStore, OverlayConfig, char_to_utf16_offset, restore,
};
use marginalia_core::{Annotation, ContentFilter, NoteState};
use web_sys::{Element, Node};

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

/// Mount `html` inside a fresh `<article>` and return it.
fn mount(html: &str) -> Element {
    let document = document();
    let body = document.body().unwrap();
    if let Some(old) = document.query_selector("article").unwrap() {
        old.remove();
    }
    let article = document.create_element("article").unwrap();
    article.set_inner_html(html);
    body.append_child(&article).unwrap();
    article
}

fn browser_dom() -> BrowserDom {
    BrowserDom::new(document(), &OverlayConfig::default())
}

fn first_text(element: &Element) -> Node {
    let mut node: Node = element.clone().into();
    while node.node_type() != Node::TEXT_NODE {
        node = node.first_child().unwrap();
    }
    node
}

fn saved(id: &str, text: &str, before: &str, after: &str) -> Annotation {
    Annotation {
        note: NoteState::Saved("n".into()),
        ..Annotation::pending(id.into(), text, chrono::Utc::now(), before, after)
    }
}

// === Wrapping ===

#[wasm_bindgen_test]
fn test_wrap_and_unwrap_single_text_node() {
    let article = mount("<p>hello brave world</p>");
    let mut dom = browser_dom();
    let text = first_text(&article);
    let id = AnnotationId::from("w1");

    dom.wrap_range(&DomRange::new(text.clone(), 6, text, 11), &id)
        .unwrap();
    assert_eq!(
        article.inner_html(),
        r#"<p>hello <span class="marginalia-highlight" data-anno-id="w1">brave</span> world</p>"#
    );
    assert_eq!(dom.highlight_ids(), vec![id.clone()]);

    assert!(dom.unwrap_highlight(&id));
    assert_eq!(article.inner_html(), "<p>hello brave world</p>");
    // Unwrapping merges the text back into one node.
    assert_eq!(article.first_child().unwrap().child_nodes().length(), 1);
}

#[wasm_bindgen_test]
fn test_wrap_across_elements() {
    let article = mount("<p>one <b>two</b> three</p>");
    let mut dom = browser_dom();
    let p = article.first_element_child().unwrap();
    let start = p.first_child().unwrap();
    let end = p.last_child().unwrap();

    dom.wrap_range(&DomRange::new(start, 2, end, 3), &AnnotationId::from("x"))
        .unwrap();
    let el = dom.highlight_element(&AnnotationId::from("x")).unwrap();
    assert_eq!(el.text_content().unwrap(), "e two th");
}

#[wasm_bindgen_test]
fn test_wrap_rejects_bad_offsets() {
    let article = mount("<p>short</p>");
    let mut dom = browser_dom();
    let text = first_text(&article);
    let err = dom
        .wrap_range(&DomRange::new(text.clone(), 2, text, 40), &AnnotationId::from("bad"))
        .unwrap_err();
    assert!(matches!(
        err,
        marginalia_browser::DomError::OffsetOutOfBounds { offset: 40, len: 5 }
    ));
    assert_eq!(article.inner_html(), "<p>short</p>");
}

#[wasm_bindgen_test]
fn test_astral_chars_use_char_offsets() {
    let article = mount("<p>a😀b c</p>");
    let mut dom = browser_dom();
    let text = first_text(&article);
    assert_eq!(char_to_utf16_offset("a😀b c", 3), 4);

    dom.wrap_range(&DomRange::new(text.clone(), 1, text, 3), &AnnotationId::from("e"))
        .unwrap();
    let el = dom.highlight_element(&AnnotationId::from("e")).unwrap();
    assert_eq!(el.text_content().unwrap(), "😀b");
}

// === Restore ===

#[wasm_bindgen_test]
fn test_restore_uses_context() {
    let article = mount("<p>cats and dogs. birds and dogs.</p>");
    let mut dom = browser_dom();
    let set: AnnotationSet = [saved("r1", "dogs", "birds and ", ".")].into_iter().collect();

    let report = restore(&mut dom, &set, &ContentFilter::default(), &Default::default());
    assert_eq!(report.anchored, 1);
    assert_eq!(
        article.inner_html(),
        r#"<p>cats and dogs. birds and <span class="marginalia-highlight" data-anno-id="r1">dogs</span>.</p>"#
    );

    // A second pass leaves exactly one highlight.
    restore(&mut dom, &set, &ContentFilter::default(), &Default::default());
    assert_eq!(dom.highlight_ids().len(), 1);
}

#[wasm_bindgen_test]
fn test_content_root_prefers_article() {
    mount("<p>x</p>");
    let dom = browser_dom();
    let root = dom.content_root().unwrap();
    assert_eq!(dom.tag_name(&root).as_deref(), Some("article"));
}

// === Storage ===

#[wasm_bindgen_test]
async fn test_local_store_round_trip() {
    let store = LocalStore;
    let key = "https://test.example/marginalia-web-test";
    let set: AnnotationSet = [saved("s1", "quote", "", "")].into_iter().collect();

    store.set(key, &set).await.unwrap();
    let loaded = store.get(key).await.unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(store.get_all().await.unwrap().contains_key(key));
    web_sys::window()
        .unwrap()
        .local_storage()
        .unwrap()
        .unwrap()
        .remove_item(key)
        .unwrap();
}

#[wasm_bindgen_test]
async fn test_local_store_ignores_foreign_values() {
    let key = "marginalia-web-test-theme";
    let storage = web_sys::window().unwrap().local_storage().unwrap().unwrap();
    storage.set_item(key, r#"{"theme":"dark"}"#).unwrap();

    assert_eq!(LocalStore.get(key).await.unwrap(), None);
    assert!(LocalStore.get_all().await.unwrap().contains_key(key));
    storage.remove_item(key).unwrap();
}
