use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

/// Coalesces canvas repaints into one `requestAnimationFrame` callback.
///
/// Any number of `mark_dirty()` calls between two frames produce a single
/// draw. The canvases here are static between data changes, so nothing
/// re-arms itself after a draw.
pub struct RenderScheduler {
    inner: Rc<Inner>,
}

struct Inner {
    window: Option<web_sys::Window>,
    raf_id: Cell<Option<i32>>,
    callback: RefCell<Option<Closure<dyn FnMut()>>>,
}

impl Inner {
    fn request_frame(&self) {
        if self.raf_id.get().is_some() {
            return;
        }
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let callback = self.callback.borrow();
        let Some(cb) = callback.as_ref() else {
            return;
        };
        if let Ok(id) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
            self.raf_id.set(Some(id));
        }
    }
}

impl RenderScheduler {
    pub fn new(render_fn: impl Fn() + 'static) -> Self {
        let inner = Rc::new(Inner {
            window: web_sys::window(),
            raf_id: Cell::new(None),
            callback: RefCell::new(None),
        });

        let inner_cb = Rc::downgrade(&inner);
        let cb = Closure::<dyn FnMut()>::new(move || {
            let Some(inner) = inner_cb.upgrade() else {
                return;
            };
            inner.raf_id.set(None);
            render_fn();
        });
        *inner.callback.borrow_mut() = Some(cb);

        Self { inner }
    }

    /// Schedule a repaint for the next frame unless one is already pending.
    pub fn mark_dirty(&self) {
        self.inner.request_frame();
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        if let Some(raf_id) = self.inner.raf_id.replace(None)
            && let Some(window) = self.inner.window.as_ref()
        {
            let _ = window.cancel_animation_frame(raf_id);
        }
        self.inner.callback.borrow_mut().take();
    }
}
