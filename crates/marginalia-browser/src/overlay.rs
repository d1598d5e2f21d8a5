//! Content-script controller.
//!
//! One [`Overlay`] per page, shared as `Rc<RefCell<_>>`. Event callbacks hold
//! `Weak` references and skip the event if the overlay is gone or already
//! borrowed. Storage writes run on `spawn_local` after the borrow is released.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use marginalia_core::{
    AnnotateError, AnnotationId, AnnotationSession, OverlayConfig, PendingWrite, RestoreReport,
    display_time, load_page_annotations,
};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, Node, Window};

use crate::dom::BrowserDom;
use crate::popup::{self, BUTTON_ID, NoteDisplay, POPUP_ID};
use crate::selection::{SelectionSnapshot, clear_selection, read_selection};
use crate::storage::PageStore;

const HIGHLIGHT_FAILED: &str = "Failed to create highlight. Please try selecting the text again.";
const CONFIRM_DELETE: &str = "Delete this annotation?";

type Shared = Rc<RefCell<Overlay>>;
type WeakOverlay = Weak<RefCell<Overlay>>;

/// Page state plus the UI currently on screen.
pub struct Overlay {
    session: AnnotationSession,
    dom: BrowserDom,
    store: PageStore,
    window: Window,
    popup_listeners: Vec<EventListener>,
    button_listener: Option<EventListener>,
}

/// Keeps the overlay alive. Dropping it detaches every document listener.
pub struct OverlayHandle {
    overlay: Shared,
    _listeners: Vec<EventListener>,
}

impl OverlayHandle {
    /// Run a restore pass now. `None` if the overlay is busy.
    pub fn restore(&self) -> Option<RestoreReport> {
        let mut overlay = self.overlay.try_borrow_mut().ok()?;
        Some(overlay.restore())
    }

    pub fn annotation_count(&self) -> usize {
        self.overlay
            .try_borrow()
            .map(|o| o.session.annotations().len())
            .unwrap_or(0)
    }

    pub fn page_url(&self) -> Option<String> {
        self.overlay
            .try_borrow()
            .ok()
            .map(|o| o.session.page_url().to_string())
    }
}

/// Run `f` if the overlay still exists and nobody else holds it.
fn with_overlay(weak: &WeakOverlay, f: impl FnOnce(&mut Overlay, &WeakOverlay)) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let Ok(mut overlay) = shared.try_borrow_mut() else {
        tracing::debug!("overlay: busy, skipping event");
        return;
    };
    f(&mut *overlay, weak);
}

/// Drop listeners on the next tick.
///
/// A gloo listener must not be dropped while its own callback is running.
fn retire(listeners: Vec<EventListener>) {
    if listeners.is_empty() {
        return;
    }
    Timeout::new(0, move || drop(listeners)).forget();
}

fn target_node(event: &Event) -> Option<Node> {
    event.target()?.dyn_into::<Node>().ok()
}

/// Whether `node` sits inside the note popup or the add button.
fn in_overlay_ui(node: &Node) -> bool {
    let element = match node.dyn_ref::<Element>() {
        Some(el) => Some(el.clone()),
        None => node.parent_element(),
    };
    element
        .and_then(|el| el.closest(&format!("#{POPUP_ID}, #{BUTTON_ID}")).ok().flatten())
        .is_some()
}

impl Overlay {
    fn alert(&self, message: &str) {
        if let Err(e) = self.window.alert_with_message(message) {
            tracing::warn!("overlay: alert failed: {:?}", e);
        }
    }

    fn restore(&mut self) -> RestoreReport {
        let report = self.session.restore(&mut self.dom);
        if report.missing() > 0 {
            tracing::info!(?report, "overlay: some annotations could not be re-anchored");
        } else {
            tracing::debug!(?report, "overlay: restored highlights");
        }
        report
    }

    fn commit(&self, write: PendingWrite) {
        let store = self.store;
        spawn_local(async move {
            if let Err(e) = write.commit(&store).await {
                tracing::error!("overlay: failed to save annotations: {:?}", e);
            }
        });
    }

    fn close_popup(&mut self) {
        popup::remove_by_id(self.dom.document(), POPUP_ID);
        retire(std::mem::take(&mut self.popup_listeners));
    }

    fn close_button(&mut self) {
        popup::remove_by_id(self.dom.document(), BUTTON_ID);
        retire(self.button_listener.take().into_iter().collect());
    }

    fn set_popup(&mut self, shown: Result<Vec<EventListener>, JsValue>) {
        match shown {
            Ok(listeners) => self.popup_listeners = listeners,
            Err(e) => tracing::warn!("overlay: could not show popup: {:?}", e),
        }
    }

    /// The mouse was released outside the overlay UI.
    fn selection_changed(&mut self, weak: &WeakOverlay) {
        match read_selection(&self.window) {
            Some(snapshot) => self.show_button(weak, snapshot),
            None => self.close_button(),
        }
    }

    fn show_button(&mut self, weak: &WeakOverlay, snapshot: SelectionSnapshot) {
        self.close_button();
        let Some(rect) = snapshot.rect.clone() else {
            return;
        };
        let weak = weak.clone();
        let mut snapshot = Some(snapshot);
        let shown = popup::show_add_button(self.dom.document(), &rect, move |event: &Event| {
            event.prevent_default();
            event.stop_propagation();
            if let Some(snapshot) = snapshot.take() {
                with_overlay(&weak, |overlay, weak| overlay.create(weak, snapshot));
            }
        });
        match shown {
            Ok(listener) => self.button_listener = Some(listener),
            Err(e) => tracing::warn!("overlay: could not show add button: {:?}", e),
        }
    }

    fn create(&mut self, weak: &WeakOverlay, snapshot: SelectionSnapshot) {
        self.close_button();
        let created =
            self.session
                .create_from_selection(&mut self.dom, &snapshot.range, &snapshot.text);
        clear_selection(&self.window);
        match created {
            Ok(id) => self.open_note_input(weak, id),
            Err(AnnotateError::Dom(e)) => {
                tracing::warn!("overlay: highlight failed: {:?}", e);
                self.alert(HIGHLIGHT_FAILED);
            }
            Err(e) => tracing::warn!("overlay: could not create annotation: {:?}", e),
        }
    }

    fn open_note_input(&mut self, weak: &WeakOverlay, id: AnnotationId) {
        let Some(anchor) = self.dom.highlight_element(&id) else {
            tracing::warn!(%id, "overlay: no highlight to attach the note input to");
            return;
        };
        let existing = self
            .session
            .get(&id)
            .map(|a| a.note.text().to_string())
            .unwrap_or_default();

        self.close_popup();
        let (save_weak, save_id) = (weak.clone(), id.clone());
        let (cancel_weak, cancel_id) = (weak.clone(), id);
        let shown = popup::show_note_input(
            self.dom.document(),
            &anchor,
            &existing,
            move |note| with_overlay(&save_weak, |o, _| o.save_note(&save_id, &note)),
            move || with_overlay(&cancel_weak, |o, _| o.cancel_note(&cancel_id)),
        );
        self.set_popup(shown);
    }

    fn save_note(&mut self, id: &AnnotationId, note: &str) {
        let write = self.session.set_note(id, note);
        self.close_popup();
        match write {
            Ok(write) => self.commit(write),
            Err(e) => tracing::warn!("overlay: could not save note: {:?}", e),
        }
    }

    fn cancel_note(&mut self, id: &AnnotationId) {
        self.session.cancel_note(id, &mut self.dom);
        self.close_popup();
    }

    fn open_viewer(&mut self, weak: &WeakOverlay, id: AnnotationId) {
        self.close_button();
        let Some(anchor) = self.dom.highlight_element(&id) else {
            return;
        };
        let (quote, note, created) = match self.session.open_viewer(&id) {
            Ok(a) => (
                a.text.clone(),
                a.note.text().to_string(),
                display_time(&a.timestamp.with_timezone(&chrono::Local)),
            ),
            Err(e) => {
                tracing::debug!("overlay: {:?}", e);
                return;
            }
        };

        self.close_popup();
        let display = NoteDisplay {
            quote: &quote,
            note: &note,
            created,
        };
        let (edit_weak, edit_id) = (weak.clone(), id.clone());
        let (delete_weak, delete_id) = (weak.clone(), id);
        let close_weak = weak.clone();
        let shown = popup::show_note_view(
            self.dom.document(),
            &anchor,
            &display,
            move || with_overlay(&edit_weak, |o, weak| o.edit(weak, edit_id.clone())),
            move || with_overlay(&delete_weak, |o, _| o.delete(&delete_id)),
            move || with_overlay(&close_weak, |o, _| o.close_viewer()),
        );
        self.set_popup(shown);
    }

    fn edit(&mut self, weak: &WeakOverlay, id: AnnotationId) {
        if let Err(e) = self.session.begin_edit(&id) {
            tracing::debug!("overlay: {:?}", e);
            return;
        }
        self.open_note_input(weak, id);
    }

    fn delete(&mut self, id: &AnnotationId) {
        let confirmed = self
            .window
            .confirm_with_message(CONFIRM_DELETE)
            .unwrap_or(false);
        if !confirmed {
            return;
        }
        let write = self.session.remove(id, &mut self.dom);
        self.close_popup();
        match write {
            Ok(write) => self.commit(write),
            Err(e) => tracing::warn!("overlay: could not delete annotation: {:?}", e),
        }
    }

    fn close_viewer(&mut self) {
        self.session.close_viewer();
        self.close_popup();
    }

    fn clicked(&mut self, weak: &WeakOverlay, node: &Node) {
        match self.dom.enclosing_highlight(node) {
            // The note input for an unsaved highlight stays open.
            Some(id) if self.session.get(&id).is_some_and(|a| a.is_pending()) => {}
            Some(id) => self.open_viewer(weak, id),
            None => {
                self.close_popup();
                self.close_button();
                if let Some(id) = self.session.click_outside(&mut self.dom) {
                    tracing::debug!(%id, "overlay: dropped unsaved highlight");
                }
            }
        }
    }
}

fn schedule_restores(weak: &WeakOverlay, delays: &[u32]) {
    for &delay in delays {
        let weak = weak.clone();
        Timeout::new(delay, move || {
            with_overlay(&weak, |o, _| {
                o.restore();
            })
        })
        .forget();
    }
}

/// Load stored annotations, restore them, then schedule the follow-up passes
/// for content that renders late.
fn on_ready(weak: WeakOverlay) {
    let mut target = None;
    with_overlay(&weak, |o, _| {
        if let Err(e) = popup::ensure_stylesheet(o.dom.document(), o.session.config()) {
            tracing::warn!("overlay: could not install stylesheet: {:?}", e);
        }
        target = Some((o.store, o.session.page_url().to_string()));
    });
    let Some((store, page_url)) = target else {
        return;
    };

    spawn_local(async move {
        let loaded = load_page_annotations(&store, &page_url).await;
        let mut delays = Vec::new();
        with_overlay(&weak, |o, _| {
            match loaded {
                Ok(set) => {
                    tracing::info!(count = set.len(), "overlay: loaded annotations");
                    o.close_popup();
                    o.session.remove_unsaved_annotation(&mut o.dom);
                    o.session.set_annotations(set);
                    o.restore();
                }
                Err(e) => tracing::error!("overlay: failed to load annotations: {:?}", e),
            }
            delays = o.session.config().restore.retry_delays_ms.clone();
        });
        schedule_restores(&weak, &delays);
    });
}

/// Attach the overlay to the current page.
pub fn start(config: OverlayConfig) -> Result<OverlayHandle, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let page_url = window.location().href()?;

    let selection_delay = config.restore.selection_delay_ms;
    let visibility_delay = config.restore.visibility_delay_ms;
    let overlay = Rc::new(RefCell::new(Overlay {
        dom: BrowserDom::new(document.clone(), &config),
        session: AnnotationSession::new(page_url, config),
        store: PageStore::detect(),
        window,
        popup_listeners: Vec::new(),
        button_listener: None,
    }));
    let weak = Rc::downgrade(&overlay);
    let mut listeners = Vec::new();

    if document.ready_state() == "loading" {
        let weak = weak.clone();
        listeners.push(EventListener::once(
            &document,
            "DOMContentLoaded",
            move |_| on_ready(weak),
        ));
    } else {
        on_ready(weak.clone());
    }

    {
        let weak = weak.clone();
        listeners.push(EventListener::new(&document, "mouseup", move |event| {
            if target_node(event).is_some_and(|node| in_overlay_ui(&node)) {
                return;
            }
            // Let the browser finish updating the selection first.
            let weak = weak.clone();
            Timeout::new(selection_delay, move || {
                with_overlay(&weak, |o, weak| o.selection_changed(weak))
            })
            .forget();
        }));
    }

    {
        let weak = weak.clone();
        listeners.push(EventListener::new(&document, "click", move |event| {
            let Some(node) = target_node(event) else {
                return;
            };
            if in_overlay_ui(&node) {
                return;
            }
            with_overlay(&weak, |o, weak| o.clicked(weak, &node));
        }));
    }

    {
        let weak = weak.clone();
        let doc = document.clone();
        listeners.push(EventListener::new(
            &document,
            "visibilitychange",
            move |_| {
                if doc.hidden() {
                    return;
                }
                let weak = weak.clone();
                Timeout::new(visibility_delay, move || {
                    with_overlay(&weak, |o, _| {
                        o.restore();
                    })
                })
                .forget();
            },
        ));
    }

    tracing::debug!("overlay: attached");
    Ok(OverlayHandle {
        overlay,
        _listeners: listeners,
    })
}
