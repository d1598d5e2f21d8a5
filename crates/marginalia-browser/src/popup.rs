//! In-page UI: the "Add Note" button, the note input and the note viewer.
//!
//! Popups are plain fixed-position elements appended to the body. Callers own
//! the returned listeners; dropping them detaches the handlers.

use gloo_events::EventListener;
use marginalia_core::OverlayConfig;
use markdown_weaver_escape::escape_html;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, DomRect, Element, Event, HtmlElement, HtmlTextAreaElement};

pub const POPUP_ID: &str = "marginalia-popup";
pub const BUTTON_ID: &str = "marginalia-button";
const STYLE_ID: &str = "marginalia-style";

fn escaped(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let _ = escape_html(&mut out, text);
    out
}

/// Install the highlight and popup stylesheet once per document.
pub fn ensure_stylesheet(document: &Document, config: &OverlayConfig) -> Result<(), JsValue> {
    if document.get_element_by_id(STYLE_ID).is_some() {
        return Ok(());
    }
    let style = document.create_element("style")?;
    style.set_id(STYLE_ID);
    style.set_text_content(Some(&format!(
        ".{class} {{ background-color: #fff3a3; cursor: pointer; }}\n\
         #{POPUP_ID} {{ background: #fff; border: 1px solid #ccc; border-radius: 6px; \
         padding: 10px; width: 280px; box-shadow: 0 2px 10px rgba(0,0,0,.2); font: 14px sans-serif; }}\n\
         #{POPUP_ID} textarea {{ width: 100%; min-height: 80px; box-sizing: border-box; }}\n\
         #{BUTTON_ID} {{ background: #333; color: #fff; padding: 6px 10px; border-radius: 4px; \
         cursor: pointer; font: 13px sans-serif; width: 100px; text-align: center; }}",
        class = config.highlight_class,
    )));
    let head = document
        .head()
        .map(Element::from)
        .or_else(|| document.document_element())
        .ok_or_else(|| JsValue::from_str("no head"))?;
    head.append_child(&style)?;
    Ok(())
}

/// Remove the element with `id`, if present.
pub fn remove_by_id(document: &Document, id: &str) {
    if let Some(el) = document.get_element_by_id(id) {
        el.remove();
    }
}

fn body(document: &Document) -> Result<HtmlElement, JsValue> {
    document.body().ok_or_else(|| JsValue::from_str("no body"))
}

fn create_fixed(document: &Document, tag: &str, id: &str, left: f64, top: f64) -> Result<HtmlElement, JsValue> {
    let el: HtmlElement = document.create_element(tag)?.dyn_into()?;
    el.set_id(id);
    let style = el.style();
    style.set_property("position", "fixed")?;
    style.set_property("left", &format!("{left}px"))?;
    style.set_property("top", &format!("{top}px"))?;
    style.set_property("z-index", "999999")?;
    Ok(el)
}

fn find_in(root: &Element, selector: &str) -> Result<Element, JsValue> {
    root.query_selector(selector)?
        .ok_or_else(|| JsValue::from_str(&format!("missing {selector}")))
}

fn on_click(target: &Element, mut callback: impl FnMut() + 'static) -> EventListener {
    EventListener::new(target, "click", move |event: &Event| {
        event.stop_propagation();
        callback();
    })
}

/// Show the "Add Note" button centred above the selection.
pub fn show_add_button(
    document: &Document,
    rect: &DomRect,
    on_add: impl FnMut(&Event) + 'static,
) -> Result<EventListener, JsValue> {
    remove_by_id(document, BUTTON_ID);
    let left = rect.left() + rect.width() / 2.0 - 50.0;
    let top = rect.top() - 40.0;
    let button = create_fixed(document, "div", BUTTON_ID, left, top)?;
    button.set_text_content(Some("💬 Add Note"));
    body(document)?.append_child(&button)?;
    Ok(EventListener::new(&button, "click", on_add))
}

fn popup_below(document: &Document, anchor: &Element, html: &str) -> Result<HtmlElement, JsValue> {
    remove_by_id(document, POPUP_ID);
    let rect = anchor.get_bounding_client_rect();
    let popup = create_fixed(document, "div", POPUP_ID, rect.left(), rect.bottom() + 5.0)?;
    popup.set_inner_html(html);
    body(document)?.append_child(&popup)?;
    Ok(popup)
}

/// Show the note editor under `anchor`, prefilled with `existing_note`.
pub fn show_note_input(
    document: &Document,
    anchor: &Element,
    existing_note: &str,
    mut on_save: impl FnMut(String) + 'static,
    on_cancel: impl FnMut() + 'static,
) -> Result<Vec<EventListener>, JsValue> {
    let popup = popup_below(
        document,
        anchor,
        r#"<div class="marginalia-popup-header">Add Note</div>
<textarea id="marginalia-textarea" placeholder="Write your note here..."></textarea>
<div class="marginalia-popup-buttons">
  <button id="marginalia-save">Save</button>
  <button id="marginalia-cancel">Cancel</button>
</div>"#,
    )?;

    let textarea: HtmlTextAreaElement = find_in(&popup, "#marginalia-textarea")?.dyn_into()?;
    textarea.set_value(existing_note);
    let _ = textarea.focus();

    let save = find_in(&popup, "#marginalia-save")?;
    let cancel = find_in(&popup, "#marginalia-cancel")?;
    Ok(vec![
        on_click(&save, move || on_save(textarea.value())),
        on_click(&cancel, on_cancel),
    ])
}

/// What the viewer shows for one annotation.
#[derive(Debug, Clone)]
pub struct NoteDisplay<'a> {
    pub quote: &'a str,
    pub note: &'a str,
    pub created: String,
}

impl NoteDisplay<'_> {
    pub fn to_html(&self) -> String {
        let note = if self.note.is_empty() {
            "&nbsp;".to_string()
        } else {
            escaped(self.note)
        };
        format!(
            r#"<div class="marginalia-popup-header">Your Note</div>
<div class="marginalia-view-text">"{quote}"</div>
<div class="marginalia-view-note">{note}</div>
<div class="marginalia-view-time">{created}</div>
<div class="marginalia-popup-buttons">
  <button id="marginalia-edit">Edit</button>
  <button id="marginalia-delete">Delete</button>
  <button id="marginalia-close">Close</button>
</div>"#,
            quote = escaped(self.quote),
            created = escaped(&self.created),
        )
    }
}

/// Show a saved note under `anchor` with edit, delete and close actions.
pub fn show_note_view(
    document: &Document,
    anchor: &Element,
    display: &NoteDisplay<'_>,
    on_edit: impl FnMut() + 'static,
    on_delete: impl FnMut() + 'static,
    on_close: impl FnMut() + 'static,
) -> Result<Vec<EventListener>, JsValue> {
    let popup = popup_below(document, anchor, &display.to_html())?;
    Ok(vec![
        on_click(&find_in(&popup, "#marginalia-edit")?, on_edit),
        on_click(&find_in(&popup, "#marginalia-delete")?, on_delete),
        on_click(&find_in(&popup, "#marginalia-close")?, on_close),
    ])
}
